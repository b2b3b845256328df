mod credential_key_roundtrip;
mod known_answer;

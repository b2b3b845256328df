mod entropy_quality;
mod secret_masking;
mod timing_sidechannel;

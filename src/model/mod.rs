pub mod activation;
pub mod attribution;
pub mod custom;
pub mod descriptor;
pub mod prediction;
pub mod upload;

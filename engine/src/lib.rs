pub mod adapters;
pub mod application;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub mod proto {
    tonic::include_proto!("progd");

    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("progd_descriptor");
}

pub mod mgf;
pub mod sorting;
pub mod spectrum;

pub use mgf::{
    read_mgf,
    read_mgf_file,
    MgfReadOptions,
};
pub use spectrum::{
    BinnedVector,
    Dataset,
    Peak,
    Spectrum,
};

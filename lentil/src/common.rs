#![allow(dead_code)]

pub use clap::{Args, Parser, Subcommand};
pub use log::info;

pub const DEFAULT_KNN: usize = 30;
pub const DEFAULT_COMPONENTS: usize = 10;

pub type Mat = nalgebra::DMatrix<f32>;
pub type DVec = nalgebra::DVector<f32>;

pub use diffusion_util::delim_io::{read_named_tsv, write_named_tsv, MatWithNames};
pub use diffusion_util::spectral::{build_diffusion_map, DiffusionMap, DiffusionMapArgs};

pub mod delim_io; // tsv matrices with row names
pub mod extremal; // terminal/early cell search over diffusion components
pub mod impute; // diffusion smoothing of data matrices
pub mod kernel; // adaptive anisotropic affinity kernel
pub mod knn_graph; // directed k-nearest-neighbour distance graph
pub mod multiscale; // eigen-gap selection and multiscale rescaling
pub mod neighbor_index; // HNSW index over matrix rows
pub mod operator; // markov normalization of the kernel
pub mod pca; // principal-component projection
pub mod sparse_util; // csc matrix helpers
pub mod spectral; // lanczos eigensolver and the diffusion map bundle

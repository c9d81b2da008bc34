use crate::common::*;
use crate::input::load_points;
use diffusion_util::delim_io::read_named_tsv;
use diffusion_util::impute::{run_magic_imputation, DEFAULT_IMPUTATION_STEPS};

#[derive(Args, Debug)]
pub struct ImputeArgs {
    /// Data file to smooth (TSV; rows = cells, header line)
    #[arg(required = true)]
    data_file: Box<str>,

    /// Output file
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// Build the diffusion operator on this matrix instead of the data
    /// itself (e.g. PCA projections or a multiscale embedding aligned to
    /// the same cells)
    #[arg(long, short = 'e')]
    embedding: Option<Box<str>>,

    /// Number of diffusion steps; more steps smooth harder
    #[arg(long, short = 't', default_value_t = DEFAULT_IMPUTATION_STEPS)]
    n_steps: usize,

    /// Number of diffusion components for the operator
    #[arg(long, short = 'c', default_value_t = DEFAULT_COMPONENTS)]
    n_components: usize,

    /// Number of nearest neighbours for graph construction
    #[arg(long, short, default_value_t = DEFAULT_KNN)]
    knn: usize,

    /// Density-correction exponent for the diffusion operator (0 = off)
    #[arg(long, default_value_t = 0.0)]
    alpha: f32,

    /// Run PCA on the operator matrix first, keeping this many components
    #[arg(long, short)]
    pca: Option<usize>,

    /// Random seed for the eigensolver start vector
    #[arg(long, short)]
    seed: Option<u64>,

    /// Verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_impute(args: &ImputeArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let data = read_named_tsv(&args.data_file)?;

    let operator_points = match &args.embedding {
        Some(path) => {
            let emb = load_points(path, args.pca)?;
            anyhow::ensure!(
                emb.rows == data.rows,
                "embedding rows in {} do not match the data rows",
                path
            );
            emb
        }
        None => load_points(&args.data_file, args.pca)?,
    };

    let dm = build_diffusion_map(
        &operator_points.mat,
        &DiffusionMapArgs {
            n_components: args.n_components,
            knn: args.knn,
            alpha: args.alpha,
            seed: args.seed,
        },
    )?;

    let imputed = run_magic_imputation(&data.mat, &dm, args.n_steps)?;

    // the smoothed matrix keeps the data's row and column labels
    write_named_tsv(&args.out, &imputed, &data.rows, &data.cols)?;

    info!("Wrote imputed matrix to {}", args.out);
    Ok(())
}

use crate::common::*;
use crate::input::load_points;
use diffusion_util::multiscale::multiscale_space;

#[derive(Args, Debug)]
pub struct MapArgs {
    /// Data file (TSV; rows = cells, first column = cell names, header line)
    #[arg(required = true)]
    data_file: Box<str>,

    /// Output header
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// Number of diffusion components
    #[arg(long, short = 'c', default_value_t = DEFAULT_COMPONENTS)]
    n_components: usize,

    /// Number of nearest neighbours for graph construction
    #[arg(long, short, default_value_t = DEFAULT_KNN)]
    knn: usize,

    /// Density-correction exponent for the diffusion operator (0 = off)
    #[arg(long, default_value_t = 0.0)]
    alpha: f32,

    /// Run PCA first and keep this many principal components
    #[arg(long, short)]
    pca: Option<usize>,

    /// Random seed for the eigensolver start vector
    #[arg(long, short)]
    seed: Option<u64>,

    /// Number of multiscale eigenvectors; the eigen-gap heuristic decides
    /// when omitted
    #[arg(long)]
    n_eigs: Option<usize>,

    /// Verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_map(args: &MapArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let points = load_points(&args.data_file, args.pca)?;

    let dm = build_diffusion_map(
        &points.mat,
        &DiffusionMapArgs {
            n_components: args.n_components,
            knn: args.knn,
            alpha: args.alpha,
            seed: args.seed,
        },
    )?;

    let comp_names: Vec<Box<str>> = (0..args.n_components)
        .map(|j| format!("dc_{}", j).into_boxed_str())
        .collect();

    let evals = Mat::from_fn(args.n_components, 1, |i, _| dm.eigenvalues[i]);
    write_named_tsv(
        &(args.out.to_string() + ".eigenvalues.tsv"),
        &evals,
        &comp_names,
        &["eigenvalue".into()],
    )?;

    write_named_tsv(
        &(args.out.to_string() + ".eigenvectors.tsv"),
        &dm.eigenvectors,
        &points.rows,
        &comp_names,
    )?;

    let ms = multiscale_space(&dm, args.n_eigs)?;
    let ms_names: Vec<Box<str>> = (0..ms.ncols())
        .map(|j| format!("ms_{}", j + 1).into_boxed_str())
        .collect();
    write_named_tsv(
        &(args.out.to_string() + ".multiscale.tsv"),
        &ms,
        &points.rows,
        &ms_names,
    )?;

    info!(
        "Wrote {}.eigenvalues.tsv, {}.eigenvectors.tsv, {}.multiscale.tsv",
        args.out, args.out, args.out
    );
    Ok(())
}

use crate::common::*;
use crate::input::{load_points, read_annotations, unique_labels};
use diffusion_util::extremal::{
    find_extremal_cells, EmbeddingDistance, ExtremalOrigin, FallbackSearch,
};
use diffusion_util::multiscale::multiscale_space;

#[derive(Args, Debug)]
pub struct TerminalStatesArgs {
    /// Data file (TSV; rows = cells, first column = cell names, header line)
    #[arg(required = true)]
    data_file: Box<str>,

    /// Cell-type annotation file (TSV: cell name, cell type; no header)
    #[arg(long, short = 'a', required = true)]
    annotations: Box<str>,

    /// Output file
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// Cell types to resolve (comma-separated); all annotated types when
    /// omitted
    #[arg(long, short = 'T', value_delimiter(','))]
    celltypes: Option<Vec<Box<str>>>,

    /// Seed for the pseudotime fallback; without it an unresolved cell
    /// type is skipped with a warning
    #[arg(long)]
    fallback_seed: Option<u64>,

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

    /// Verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_terminal_states(args: &TerminalStatesArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let points = load_points(&args.data_file, args.pca)?;
    let labels = read_annotations(&args.annotations, &points.rows)?;

    let targets = match &args.celltypes {
        Some(list) => list.clone(),
        None => unique_labels(&labels),
    };
    info!("Resolving terminal states for {} cell types", targets.len());

    let dm = build_diffusion_map(
        &points.mat,
        &DiffusionMapArgs {
            n_components: args.n_components,
            knn: args.knn,
            alpha: args.alpha,
            seed: args.seed,
        },
    )?;

    // the fallback walks the multiscale space; it is only built when a
    // fallback seed was requested
    let ms;
    let fallback = if let Some(seed) = args.fallback_seed {
        ms = multiscale_space(&dm, None)?;
        Some(FallbackSearch {
            points: &ms,
            estimator: &EmbeddingDistance,
            seed,
        })
    } else {
        None
    };

    let found = find_extremal_cells(&dm.eigenvectors, &labels, &targets, fallback.as_ref())?;

    let mut lines: Vec<String> = Vec::with_capacity(found.len() + 1);
    lines.push("celltype\tcell\torigin".to_string());
    for (celltype, cell) in &found {
        let origin = match cell.origin {
            ExtremalOrigin::Component {
                direction,
                component,
            } => format!("{} of dc_{}", direction, component),
            ExtremalOrigin::Pseudotime { start_row } => {
                format!("pseudotime from {}", points.rows[start_row])
            }
        };
        lines.push(format!(
            "{}\t{}\t{}",
            celltype, points.rows[cell.row], origin
        ));
    }
    let out_path: &str = &args.out;
    std::fs::write(out_path, lines.join("\n") + "\n")
        .map_err(|e| anyhow::anyhow!("failed to write {}: {}", args.out, e))?;

    info!(
        "Resolved {} of {} cell types; wrote {}",
        found.len(),
        targets.len(),
        args.out
    );
    Ok(())
}

mod common;
mod fit_impute;
mod fit_map;
mod fit_terminal_states;
mod input;

use common::*;
use fit_impute::*;
use fit_map::*;
use fit_terminal_states::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LENTIL",
    long_about = "Latent Embedding via Nonlinear Transition-operator Informed Landscapes\n\
		  Builds adaptive diffusion maps over single-cell point clouds and\n\
		  derives multiscale embeddings, operator-smoothed data, and\n\
		  terminal-state candidates from them.\n\
		  Data files are TSV matrices with a header line and a leading\n\
		  cell-name column."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Build a diffusion map and its multiscale embedding",
        long_about = "Build a diffusion map in three stages:\n\
		      (1) adaptive anisotropic kernel over the kNN graph\n\
		      (2) Markov normalization into a transition operator\n\
		      (3) dominant eigenpairs and the eigen-gap-scaled\n\
		          multiscale embedding.\n"
    )]
    Map(MapArgs),

    #[command(
        about = "Smooth a data matrix with powers of the diffusion operator",
        long_about = "Apply T^n_steps to a data matrix aligned to the same cells.\n\
		      Higher n_steps trades fidelity for noise reduction; the\n\
		      dense operator power grows with the square of the number\n\
		      of cells.\n"
    )]
    Impute(ImputeArgs),

    #[command(
        about = "Locate extremal (early/terminal) cells per cell type",
        long_about = "Scan diffusion components for per-type extrema; cell types\n\
		      without a matching extremum fall back to a seeded\n\
		      pseudotime search when --fallback-seed is given, and are\n\
		      skipped with a warning otherwise.\n",
        visible_alias = "terminal"
    )]
    TerminalStates(TerminalStatesArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Map(args) => {
            run_map(args)?;
        }
        Commands::Impute(args) => {
            run_impute(args)?;
        }
        Commands::TerminalStates(args) => {
            run_terminal_states(args)?;
        }
    }

    info!("Done");
    Ok(())
}

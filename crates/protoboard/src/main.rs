use clap::Parser;
use protoboard::output::check_dir;
use protoboard::{bundle_zip, check_file, generate, BoardConfig, GerberError, OutputPaths};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "protoboard", about = "Generate Gerber files for a protoboard PCB")]
struct Cli {
    /// Board configuration (JSON). Built-in defaults if not specified
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Continue the files of the same name found in this directory
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Override the file name prefix from the configuration
    #[arg(long)]
    prefix: Option<String>,

    /// Also pack all layers into this zip file
    #[arg(long)]
    zip: Option<PathBuf>,

    /// Read every generated file back and report problems
    #[arg(long)]
    check: bool,

    /// Check the layer files already in this directory and exit
    #[arg(long, value_name = "DIR")]
    check_dir: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(cli: &Cli) -> Result<BoardConfig, GerberError> {
    let mut config = match &cli.config {
        Some(path) => BoardConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => BoardConfig::default(),
    };
    if let Some(prefix) = &cli.prefix {
        config.prefix = prefix.clone();
    }
    Ok(config)
}

fn report_problems<'a>(
    reports: impl IntoIterator<Item = (String, &'a [String])>,
) -> Result<usize, GerberError> {
    let mut files = 0;
    let mut problems = 0;
    for (name, violations) in reports {
        for violation in violations {
            eprintln!("{name}: {violation}");
        }
        files += 1;
        problems += violations.len();
    }
    if problems > 0 {
        return Err(GerberError::Parse(format!(
            "{problems} problem(s) in {files} file(s)"
        )));
    }
    Ok(files)
}

fn run(cli: Cli) -> Result<(), GerberError> {
    if let Some(dir) = &cli.check_dir {
        let found = check_dir(dir)?;
        let checked = report_problems(
            found
                .iter()
                .map(|(_, path, report)| (path.display().to_string(), report.violations.as_slice())),
        )?;
        eprintln!("All {checked} layer file(s) passed");
        return Ok(());
    }

    let config = load_config(&cli)?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut paths = OutputPaths::new(&cli.output, config.prefix.clone());
    if let Some(base_dir) = &cli.base_dir {
        paths = paths.with_base_dir(base_dir);
    }

    let board = generate(&config, &paths)?;
    for (_, path) in &board.files {
        eprintln!("Written {}", path.display());
    }

    if let Some(zip_path) = &cli.zip {
        bundle_zip(&board, zip_path)?;
        eprintln!("Written {}", zip_path.display());
    }

    if cli.check {
        let reports = board
            .files
            .iter()
            .map(|(layer, path)| -> Result<_, GerberError> {
                Ok((layer.to_string(), check_file(path)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let checked = report_problems(
            reports
                .iter()
                .map(|(name, report)| (name.clone(), report.violations.as_slice())),
        )?;
        eprintln!("All {checked} layers passed");
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stow", about = "Inspect and convert stow data stores", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with `[markup]` and `[marshal]` settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Binary,
    Markup,
}

impl Format {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xml" => Some(Self::Markup),
            "bin" | "dat" | "stow" => Some(Self::Binary),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Markup => "markup",
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the entry tree of a store
    Inspect(InspectArgs),
    /// Convert a store between binary and markup
    Convert(ConvertArgs),
    /// Hex dump a binary store
    Hexdump(HexdumpArgs),
}

#[derive(Args)]
pub struct InspectArgs {
    pub path: PathBuf,
    /// Input format; guessed from the extension when omitted
    #[arg(long)]
    pub from: Option<Format>,
}

#[derive(Args)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    #[arg(long)]
    pub from: Option<Format>,
    /// Output format; guessed from the output extension when omitted
    #[arg(long)]
    pub to: Option<Format>,
}

#[derive(Args)]
pub struct HexdumpArgs {
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/save.XML")), Some(Format::Markup));
        assert_eq!(Format::from_path(Path::new("save.stow")), Some(Format::Binary));
        assert_eq!(Format::from_path(Path::new("save")), None);
        assert_eq!(Format::from_path(Path::new("save.json")), None);
    }

    #[test]
    fn parses_convert() {
        let cli = Cli::try_parse_from(["stow", "convert", "in.bin", "out.dat", "--to", "markup"]).unwrap();
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.to, Some(Format::Markup));
                assert_eq!(args.from, None);
            }
            _ => panic!("expected convert"),
        }
    }
}

use std::path::Path;

use anyhow::{anyhow, Context};
use colored::Colorize;
use stow_binary::{hex_dump, BinaryStore};
use stow_cursor::{copy_tree, Cursor, CursorExt};
use stow_markup::MarkupStore;
use stow_types::{EntryKind, LeafKind, LeafValue, StoreResult};

use crate::cli::*;
use crate::config::StowConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = StowConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Inspect(args) => cmd_inspect(args, &config),
        Command::Convert(args) => cmd_convert(args, &config),
        Command::Hexdump(args) => cmd_hexdump(args),
    }
}

/// A store opened from disk in either format.
enum Opened {
    Binary(BinaryStore),
    Markup(MarkupStore),
}

impl Opened {
    fn cursor(&mut self) -> &mut dyn Cursor {
        match self {
            Self::Binary(store) => store,
            Self::Markup(store) => store,
        }
    }
}

fn resolve_format(path: &Path, explicit: Option<Format>) -> anyhow::Result<Format> {
    explicit
        .or_else(|| Format::from_path(path))
        .ok_or_else(|| anyhow!("cannot tell the format of {}; pass it explicitly", path.display()))
}

fn open_store(path: &Path, format: Format, config: &StowConfig) -> anyhow::Result<Opened> {
    let opened = match format {
        Format::Binary => Opened::Binary(BinaryStore::open(path)?),
        Format::Markup => Opened::Markup(MarkupStore::open(path, config.markup.clone())?),
    };
    Ok(opened)
}

fn cmd_inspect(args: InspectArgs, config: &StowConfig) -> anyhow::Result<()> {
    let format = resolve_format(&args.path, args.from)?;
    let mut store = open_store(&args.path, format, config)
        .with_context(|| format!("opening {}", args.path.display()))?;
    println!("{} ({})", args.path.display().to_string().bold(), format.name().cyan());
    let mut lines = Vec::new();
    let entries = list_complex(store.cursor(), 1, &config.marshal.type_field, &mut lines)?;
    for line in &lines {
        println!("{line}");
    }
    println!("{} entries", entries.to_string().bold());
    Ok(())
}

fn cmd_convert(args: ConvertArgs, config: &StowConfig) -> anyhow::Result<()> {
    let from = resolve_format(&args.input, args.from)?;
    let to = resolve_format(&args.output, args.to)?;
    let mut src = open_store(&args.input, from, config)
        .with_context(|| format!("opening {}", args.input.display()))?;

    let copied = match to {
        Format::Binary => {
            let mut dst = BinaryStore::new();
            let copied = copy_tree(src.cursor(), &mut dst)?;
            dst.save_to_path(&args.output)?;
            copied
        }
        Format::Markup => {
            let mut dst = MarkupStore::with_config(config.markup.clone());
            let copied = copy_tree(src.cursor(), &mut dst)?;
            dst.save_to_path(&args.output)?;
            copied
        }
    };
    println!(
        "{} Converted {} ({}) to {} ({}), {} entries",
        "✓".green().bold(),
        args.input.display(),
        from.name().cyan(),
        args.output.display(),
        to.name().cyan(),
        copied
    );
    Ok(())
}

fn cmd_hexdump(args: HexdumpArgs) -> anyhow::Result<()> {
    let data = std::fs::read(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;
    print!("{}", hex_dump(&data));
    println!("{} bytes", data.len().to_string().bold());
    Ok(())
}

/// Render the complex under the cursor, one line per entry. Complexes show
/// their type tag when they carry one. Returns the number of entries seen.
fn list_complex(
    cursor: &mut dyn Cursor,
    depth: usize,
    type_field: &str,
    lines: &mut Vec<String>,
) -> StoreResult<usize> {
    let indent = "  ".repeat(depth);
    let mut seen = 0;
    for entry in cursor.entries()? {
        seen += 1;
        let name = entry.name.as_str();
        match entry.kind {
            EntryKind::Leaf(kind) => {
                let value = cursor.read_leaf(name, kind)?;
                lines.push(format!(
                    "{indent}{} {} = {}",
                    name.bold(),
                    kind.name().dimmed(),
                    render(&value)
                ));
            }
            EntryKind::Text => {
                let value = cursor.read_leaf(name, LeafKind::String)?;
                lines.push(format!("{indent}{} {} = {}", name.bold(), "text".dimmed(), render(&value)));
            }
            EntryKind::Complex => {
                cursor.enter_complex(name)?;
                lines.push(format!("{indent}{}{}", name.bold(), type_suffix(cursor, type_field)));
                seen += list_complex(cursor, depth + 1, type_field, lines)?;
                cursor.exit_complex()?;
            }
            EntryKind::Array => {
                cursor.enter_array(name)?;
                let len = cursor.array_length()?;
                lines.push(format!("{indent}{} [{}]", name.yellow().bold(), len));
                for index in 0..len {
                    cursor.enter_array_element(index)?;
                    lines.push(format!("{indent}  [{index}]{}", type_suffix(cursor, type_field)));
                    seen += list_complex(cursor, depth + 2, type_field, lines)?;
                    cursor.exit_array_element()?;
                }
                cursor.exit_array()?;
            }
        }
    }
    Ok(seen)
}

fn type_suffix(cursor: &dyn Cursor, type_field: &str) -> String {
    let tag = cursor.read_string_or(type_field, "");
    if tag.is_empty() {
        String::new()
    } else {
        format!(" <{}>", tag.cyan())
    }
}

fn render(value: &LeafValue) -> String {
    match value {
        LeafValue::String(s) => format!("{s:?}"),
        LeafValue::StringArray(items) => format!("{items:?}"),
        LeafValue::Flags(names) => format!("{{{}}}", names.join(", ")),
        other => other.to_text().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_sample(path: &Path) {
        let mut store = BinaryStore::new();
        store.write_string("name", "test").unwrap();
        store.write_int("count", 3).unwrap();
        store.create_complex("home").unwrap();
        store.write_string("_type", "item").unwrap();
        store.exit_complex().unwrap();
        store.create_array("list").unwrap();
        store.create_array_element().unwrap();
        store.write_bool("on", true).unwrap();
        store.exit_array_element().unwrap();
        store.exit_array().unwrap();
        store.save_to_path(path).unwrap();
    }

    #[test]
    fn explicit_format_wins() {
        let path = PathBuf::from("x.xml");
        assert_eq!(resolve_format(&path, Some(Format::Binary)).unwrap(), Format::Binary);
        assert_eq!(resolve_format(&path, None).unwrap(), Format::Markup);
        assert!(resolve_format(Path::new("x"), None).is_err());
    }

    #[test]
    fn listing_counts_nested_entries() {
        colored::control::set_override(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.bin");
        write_sample(&path);
        let mut store = open_store(&path, Format::Binary, &StowConfig::default()).unwrap();
        let mut lines = Vec::new();
        let seen = list_complex(store.cursor(), 1, "_type", &mut lines).unwrap();
        assert_eq!(seen, 6);
        assert!(lines.iter().any(|l| l.contains("home <item>")));
        assert!(lines.iter().any(|l| l.contains("name string = \"test\"")));
        assert!(lines.iter().any(|l| l.contains("list [1]")));
    }

    #[test]
    fn convert_binary_to_markup_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("s.bin");
        let xml = dir.path().join("s.xml");
        let back = dir.path().join("back.dat");
        write_sample(&bin);

        let config = StowConfig::default();
        cmd_convert(
            ConvertArgs {
                input: bin.clone(),
                output: xml.clone(),
                from: None,
                to: None,
            },
            &config,
        )
        .unwrap();
        let text = std::fs::read_to_string(&xml).unwrap();
        assert!(text.contains("<name>test</name>"), "{text}");

        cmd_convert(
            ConvertArgs {
                input: xml,
                output: back.clone(),
                from: None,
                to: None,
            },
            &config,
        )
        .unwrap();
        let mut store = BinaryStore::open(&back).unwrap();
        assert_eq!(store.read_int("count").unwrap(), 3);
        store.enter_array("list").unwrap();
        store.enter_array_element(0).unwrap();
        assert!(store.read_bool("on").unwrap());
    }

    fn convert(input: &Path, output: &Path) {
        let args = ConvertArgs {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            from: None,
            to: None,
        };
        cmd_convert(args, &StowConfig::default()).unwrap();
    }

    #[test]
    fn convert_keeps_blank_strings_from_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("blank.bin");
        let xml = dir.path().join("blank.xml");
        let back = dir.path().join("blank.dat");

        let mut store = BinaryStore::new();
        store.write_string("motto", "").unwrap();
        store.write_string("pad", "  ").unwrap();
        store.create_complex("home").unwrap();
        store.exit_complex().unwrap();
        store.save_to_path(&bin).unwrap();

        convert(&bin, &xml);
        convert(&xml, &back);

        let mut store = BinaryStore::open(&back).unwrap();
        assert_eq!(store.read_string("motto").unwrap(), "");
        assert_eq!(store.read_string("pad").unwrap(), "  ");
        store.enter_complex("home").unwrap();
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn convert_keeps_blank_strings_from_markup() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("blank.xml");
        let bin = dir.path().join("blank.bin");
        let back = dir.path().join("back.xml");
        std::fs::write(
            &xml,
            "<store><motto></motto><pad>  </pad><home/></store>",
        )
        .unwrap();

        convert(&xml, &bin);
        convert(&bin, &back);

        let mut store = MarkupStore::open(&back, Default::default()).unwrap();
        assert_eq!(store.read_string("motto").unwrap(), "");
        assert_eq!(store.read_string("pad").unwrap(), "  ");
        store.enter_complex("home").unwrap();
        assert!(store.entries().unwrap().is_empty());
        let text = std::fs::read_to_string(&back).unwrap();
        assert!(text.contains("<home/>"), "{text}");
    }
}

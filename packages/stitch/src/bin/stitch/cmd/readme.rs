use std::path::PathBuf;

use clap::Args;
use color_eyre::{Result, eyre::Context as _};
use itertools::Itertools as _;
use tracing::instrument;

/// The marker in the template that the generated reference replaces.
const PLACEHOLDER: &str = "{{COMMAND_REFERENCE}}";

#[derive(Clone, Args, Debug)]
pub struct Options {
    /// Path to the README template file.
    #[arg(short, long, default_value = "README.md.template")]
    template: PathBuf,

    /// Path to write the final README file.
    #[arg(short, long, default_value = "README.md")]
    output: PathBuf,
}

#[instrument(skip(cli))]
pub fn exec(cli: clap::Command, options: Options) -> Result<()> {
    eprintln!(
        "Generating '{}' from '{}'...",
        options.output.display(),
        options.template.display()
    );

    let template = std::fs::read_to_string(&options.template)
        .with_context(|| format!("read template {:?}", options.template))?;
    let rendered = template.replace(PLACEHOLDER, &command_reference(&cli));
    std::fs::write(&options.output, rendered)
        .with_context(|| format!("write {:?}", options.output))?;

    eprintln!("Successfully wrote {}.", options.output.display());
    Ok(())
}

/// Render a Markdown reference for every user-facing subcommand.
fn command_reference(cli: &clap::Command) -> String {
    let mut lines = Vec::new();

    let subcommands = cli
        .get_subcommands()
        .sorted_by_key(|sub| sub.get_name().to_string());
    for sub in subcommands {
        let name = sub.get_name();
        // The generator does not document itself, nor clap's builtin help.
        if name == "make-readme" || name == "help" {
            continue;
        }

        lines.push(format!("#### `{name}`\n"));
        if let Some(about) = sub.get_about() {
            lines.push(format!("{about}\n"));
        }

        let (positional, optional): (Vec<_>, Vec<_>) = sub
            .get_arguments()
            .filter(|arg| {
                let id = arg.get_id().as_str();
                id != "help" && id != "version"
            })
            .partition(|arg| arg.is_positional());

        let mut syntax = format!("`stitch {name}");
        for arg in &optional {
            match (arg.get_long(), arg.get_short()) {
                (Some(long), _) => syntax.push_str(&format!(" [--{long}]")),
                (None, Some(short)) => syntax.push_str(&format!(" [-{short}]")),
                (None, None) => {}
            }
        }
        for arg in &positional {
            syntax.push_str(&format!(" <{}>", arg.get_id()));
        }
        syntax.push('`');
        lines.push(format!("  * **Syntax:** {syntax}"));

        if !positional.is_empty() || !optional.is_empty() {
            lines.push("  * **Arguments:**".to_string());
            for arg in &positional {
                let help = arg.get_help().map(ToString::to_string).unwrap_or_default();
                lines.push(format!("      * `<{}>`: {help}", arg.get_id()));
            }
            for arg in &optional {
                let flags = [
                    arg.get_short().map(|short| format!("-{short}")),
                    arg.get_long().map(|long| format!("--{long}")),
                ]
                .into_iter()
                .flatten()
                .join(", ");
                let help = arg.get_help().map(ToString::to_string).unwrap_or_default();
                lines.push(format!("      * `{flags}`: {help}"));
            }
        }

        lines.push("\n-----\n".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Args as ClapArgs, Parser, Subcommand};
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    #[command(name = "demo")]
    struct Demo {
        #[command(subcommand)]
        command: DemoCommand,
    }

    #[derive(Subcommand)]
    enum DemoCommand {
        /// Zip the things
        Zip(ZipOptions),
        /// Ask a question
        Query,
    }

    #[derive(ClapArgs)]
    struct ZipOptions {
        /// The thing to zip.
        thing: String,

        /// Compression level.
        #[arg(short, long)]
        level: Option<u8>,
    }

    #[test]
    fn renders_sorted_reference() {
        use clap::CommandFactory as _;
        let reference = command_reference(&Demo::command());

        let query = reference.find("#### `query`").unwrap();
        let zip = reference.find("#### `zip`").unwrap();
        assert!(query < zip, "commands should be sorted by name");
        assert!(reference.contains("Zip the things"));
        assert!(reference.contains("`stitch zip [--level] <thing>`"));
        assert!(reference.contains("* `<thing>`: The thing to zip."));
        assert!(reference.contains("* `-l, --level`: Compression level."));
    }

    #[test]
    fn template_placeholder_is_replaced() {
        use clap::CommandFactory as _;
        let template = "# Demo\n\n{{COMMAND_REFERENCE}}\n";
        let rendered = template.replace(PLACEHOLDER, &command_reference(&Demo::command()));
        assert!(!rendered.contains(PLACEHOLDER));
        assert!(rendered.starts_with("# Demo"));
    }

    #[test]
    fn generator_documents_neither_itself_nor_help() {
        let cli = clap::Command::new("stitch")
            .subcommand(clap::Command::new("make-readme"))
            .subcommand(clap::Command::new("splice"));
        let reference = command_reference(&cli);
        assert!(!reference.contains("make-readme"));
        assert_eq!(reference.matches("#### ").count(), 1);
    }
}

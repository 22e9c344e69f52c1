use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use imago::{
    actions::build::{invoke as InvokeBuild, BuildActionArgs},
    actions::info::{invoke as InvokeInfo, InfoActionArgs},
    part::Partition,
    scheme::{parse_alias, SchemeContext, SchemeRegistry},
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct ImagoArgs {
    #[command(subcommand)]
    action: ActionCommand,
}

#[derive(Args, Debug)]
struct BuildAction {
    #[arg(short, required = true)]
    image: String,

    #[arg(short, long)]
    scheme: String,

    /// Boot code file to embed, if the scheme takes one.
    #[arg(short, long)]
    bootcode: Option<PathBuf>,

    #[arg(long, action)]
    overwrite: bool,

    /// Partition spec: alias[/label]:size, e.g. freebsd-ufs/root:4GiB.
    #[arg(short, long = "partition")]
    partitions: Vec<String>,
}

#[derive(Args, Debug)]
struct SchemesAction {
    scheme: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ActionCommand {
    Build(BuildAction),
    Schemes(SchemesAction),
}

fn parse_partition(spec: &str) -> Result<Partition> {
    let (head, size) = spec
        .rsplit_once(':')
        .ok_or_else(|| eyre!("bad partition spec '{}': expected alias[/label]:size", spec))?;

    let (alias, label) = match head.split_once('/') {
        Some((alias, label)) => (alias, Some(label.to_string())),
        None => (head, None),
    };

    Ok(Partition::new(
        parse_alias(alias).ok_or_else(|| eyre!("unknown partition type alias: {}", alias))?,
        label,
        parse_size::parse_size(size).map_err(|e| eyre!("size parsing failed: {}", e))?,
    ))
}

impl TryFrom<&BuildAction> for BuildActionArgs {
    type Error = color_eyre::eyre::Error;

    fn try_from(value: &BuildAction) -> Result<Self, Self::Error> {
        Ok(BuildActionArgs {
            scheme: value.scheme.clone(),
            bootcode: value.bootcode.clone(),
            partitions: value
                .partitions
                .iter()
                .map(|s| parse_partition(s))
                .collect::<Result<_>>()?,
            overwrite: value.overwrite,
        })
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = ImagoArgs::parse();

    Ok(match args.action {
        ActionCommand::Build(a) => InvokeBuild(&a.image, (&a).try_into()?)?,
        ActionCommand::Schemes(a) => {
            let ctx = SchemeContext::new(SchemeRegistry::builtin());
            InvokeInfo(&ctx, InfoActionArgs { scheme: a.scheme })?
        }
    })
}

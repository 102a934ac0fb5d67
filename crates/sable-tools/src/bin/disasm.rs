// crates/sable-tools/src/bin/disasm.rs
//! Désassembleur Sable pour scripts `.sb`.
//!
//! Exemples :
//!   sable-disasm -f demo.sb
//!   sable-disasm -f demo.sb --strip
//!   sable-disasm -f - < demo.sb
//!   sable-disasm -f demo.sb --json | jq
//!
//! Options utiles :
//!   -f, --file <p>  : script à compiler puis désassembler ('-' pour stdin)
//!   -s, --strip     : omet les sources du listing
//!   --emit <f>      : écrit le listing dans un fichier au lieu de stdout
//!   --json          : imprime une vue JSON structurée
//!   --emit-json <f> : écrit le JSON dans un fichier
//!   --max-depth <n> : borne la récursion dans les closures imbriquées
//!   --color <mode>  : auto|always|never
//!   --time          : chrono
//!
//! L'aide et la version sortent avec le code 1, comme toute autre fin
//! sans listing produit.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use sable_tools::prelude::*;
use sable_tools::{validate, ColorMode as GlobalColorMode, DisasmOptions, Engine};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Parser, Debug)]
#[command(name = "sable-disasm", version, about = "Désassembleur Sable (.sb -> texte/JSON)")]
struct Cli {
    /// Script à compiler puis désassembler ('-' pour stdin)
    #[arg(short, long)]
    file: PathBuf,

    /// Omet les sources du listing, à toutes les profondeurs
    #[arg(short, long)]
    strip: bool,

    /// Chemin fichier où écrire le listing (défaut: stdout)
    #[arg(long)]
    emit: Option<PathBuf>,

    /// Affiche un JSON structuré sur stdout
    #[arg(long)]
    json: bool,

    /// Écrit le JSON structuré dans un fichier
    #[arg(long)]
    emit_json: Option<PathBuf>,

    /// Profondeur maximale de récursion dans les closures
    #[arg(long)]
    max_depth: Option<usize>,

    /// Nom logique quand l'entrée est '-' (stdin)
    #[arg(long, default_value = "<stdin>")]
    stdin_name: String,

    /// Affiche la durée de traitement
    #[arg(long)]
    time: bool,

    /// Couleurs des diagnostics: auto|always|never
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // L'aide et la version ne produisent pas de listing : code 1,
            // comme les erreurs d'arguments.
            let _ = e.print();
            std::process::exit(1);
        }
    };
    if let Err(e) = real_main(cli) {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    setup_colors(match cli.color {
        ColorChoice::Auto => GlobalColorMode::Auto,
        ColorChoice::Always => GlobalColorMode::Always,
        ColorChoice::Never => GlobalColorMode::Never,
    });
    log::debug!("{}", version_banner("sable-disasm"));

    let timer = Timer::start();

    let (source, label) = read_input(&cli)?;
    let func = Engine::new().compile(&source, &label)?;
    validate(&func).with_context(|| format!("bytecode invalide pour `{label}`"))?;

    let opts = DisasmOptions { strip: cli.strip, max_depth: cli.max_depth };
    let txt = listing(&func, &opts)?;
    if let Some(file) = &cli.emit {
        let out = to_utf8(file.clone()).context("chemin `--emit` non UTF-8")?;
        write_text(&out, &txt)?;
        eprintln!("📝 Disasm → {out}");
    } else {
        print!("{txt}");
    }

    if cli.json || cli.emit_json.is_some() {
        let view = function_json(&func, cli.strip)?;
        let pretty = serde_json::to_string_pretty(&view)?;
        if let Some(file) = &cli.emit_json {
            let out = to_utf8(file.clone()).context("chemin `--emit-json` non UTF-8")?;
            write_text(&out, &pretty)?;
            eprintln!("🧾 JSON → {out}");
        } else {
            println!("{pretty}");
        }
    }

    if cli.time {
        eprintln!("⏱️  {}", timer.pretty());
    }

    Ok(())
}

fn read_input(cli: &Cli) -> Result<(String, String)> {
    if cli.file.as_os_str() == "-" {
        Ok((read_stdin_to_string()?, cli.stdin_name.clone()))
    } else {
        let p = to_utf8(cli.file.clone())?;
        let source = read_text(&p)?;
        Ok((source, p.to_string()))
    }
}

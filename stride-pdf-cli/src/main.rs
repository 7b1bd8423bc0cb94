use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stride_pdf::{
    Document, EncryptionStrength, PageRange, PasswordType, Permissions, SaveFlags,
    SecuritySettings,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stridepdf",
    about = "Progressive PDF load/save toolkit",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a PDF file
    Info {
        /// Input PDF file
        input: PathBuf,

        /// Password, if the file is protected
        #[arg(short, long, default_value = "")]
        password: String,
    },

    /// Rewrite a PDF with the chosen save layout
    Rewrite {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Password, if the file is protected
        #[arg(short, long, default_value = "")]
        password: String,

        /// Append changes to the original bytes instead of rewriting
        #[arg(long)]
        incremental: bool,

        /// Use a cross-reference stream instead of the classic table
        #[arg(long)]
        xref_stream: bool,

        /// Order output for first-page-first display
        #[arg(long)]
        linearize: bool,

        /// Drop structurally identical duplicate objects
        #[arg(long)]
        dedupe: bool,

        /// Leave the metadata timestamps untouched
        #[arg(long)]
        keep_dates: bool,

        /// Raise the declared file version (two digits, e.g. 17 for 1.7)
        #[arg(long)]
        file_version: Option<u8>,
    },

    /// Merge pages from multiple PDFs into one
    Merge {
        /// Input PDF files
        files: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Page range per input, zero-based (e.g. "0,2-4"); "all" takes
        /// every page
        #[arg(short = 'r', long)]
        ranges: Option<Vec<String>>,
    },

    /// Password-protect a PDF
    Encrypt {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// User (open) password
        #[arg(long, default_value = "")]
        user_password: String,

        /// Owner (permissions) password
        #[arg(long)]
        owner_password: String,

        /// Use 40-bit keys instead of 128-bit
        #[arg(long)]
        weak: bool,
    },

    /// Remove password protection from a PDF
    Decrypt {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// The document's owner password
        #[arg(short, long)]
        password: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { input, password } => info(&input, &password),
        Commands::Rewrite {
            input,
            output,
            password,
            incremental,
            xref_stream,
            linearize,
            dedupe,
            keep_dates,
            file_version,
        } => {
            let mut flags = SaveFlags::empty();
            if incremental {
                flags |= SaveFlags::INCREMENTAL;
            }
            if xref_stream {
                flags |= SaveFlags::XREF_STREAM;
            }
            if linearize {
                flags |= SaveFlags::LINEARIZED;
            }
            if dedupe {
                flags |= SaveFlags::REMOVE_REDUNDANT_OBJECTS;
            }
            if keep_dates {
                flags |= SaveFlags::NO_UPDATE_METADATA_DATE;
            }
            rewrite(&input, &output, &password, flags, file_version)
        }
        Commands::Merge {
            files,
            output,
            ranges,
        } => merge(&files, &output, ranges.as_deref()),
        Commands::Encrypt {
            input,
            output,
            user_password,
            owner_password,
            weak,
        } => encrypt(&input, &output, &user_password, &owner_password, weak),
        Commands::Decrypt {
            input,
            output,
            password,
        } => decrypt(&input, &output, &password),
    }
}

fn load(input: &PathBuf, password: &str) -> Result<Document> {
    Document::load_from_path(input, password)
        .with_context(|| format!("Failed to load {}", input.display()))
}

fn info(input: &PathBuf, password: &str) -> Result<()> {
    let doc = load(input, password)?;

    println!("File:       {}", input.display());
    println!("Version:    PDF {}.{}", doc.file_version() / 10, doc.file_version() % 10);
    println!("Pages:      {}", doc.page_count()?);
    println!("Objects:    {}", doc.object_count());
    println!("Encryption: {:?}", doc.encrypt_type());
    if doc.password_type() != PasswordType::NoPassword {
        println!("Password:   {:?}", doc.password_type());
        let perms = doc.permissions();
        println!(
            "Print:      {}",
            if perms.contains(Permissions::PRINT) { "yes" } else { "no" }
        );
        println!(
            "Modify:     {}",
            if perms.contains(Permissions::MODIFY_CONTENTS) { "yes" } else { "no" }
        );
    }
    if let Some(title) = doc.title() {
        println!("Title:      {title}");
    }
    Ok(())
}

fn rewrite(
    input: &PathBuf,
    output: &PathBuf,
    password: &str,
    flags: SaveFlags,
    file_version: Option<u8>,
) -> Result<()> {
    let doc = load(input, password)?;
    if let Some(version) = file_version {
        doc.set_file_version(version)?;
    }
    doc.save_as_path(output, flags)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn merge(files: &[PathBuf], output: &PathBuf, ranges: Option<&[String]>) -> Result<()> {
    if files.is_empty() {
        bail!("No input files given");
    }
    if let Some(ranges) = ranges {
        if ranges.len() != files.len() {
            bail!(
                "Got {} ranges for {} inputs",
                ranges.len(),
                files.len()
            );
        }
    }

    let merged = Document::new();
    for (index, file) in files.iter().enumerate() {
        let source = load(file, "")?;
        let range = match ranges.and_then(|r| r.get(index)) {
            Some(spec) if spec != "all" => PageRange::parse(spec)?,
            _ => PageRange::all(source.page_count()?),
        };
        let imported = stride_pdf::import_pages(&merged, &source, &range)?;
        println!("{}: {} pages", file.display(), imported);
    }

    merged.save_as_path(output, SaveFlags::empty())?;
    println!(
        "Wrote {} ({} pages)",
        output.display(),
        merged.page_count()?
    );
    Ok(())
}

fn encrypt(
    input: &PathBuf,
    output: &PathBuf,
    user_password: &str,
    owner_password: &str,
    weak: bool,
) -> Result<()> {
    let doc = load(input, "")?;
    let strength = if weak {
        EncryptionStrength::Rc4_40bit
    } else {
        EncryptionStrength::Rc4_128bit
    };
    doc.set_security_handler(SecuritySettings::new(
        user_password,
        owner_password,
        Permissions::PRINT | Permissions::ACCESSIBILITY,
        strength,
    ))?;
    doc.save_as_path(output, SaveFlags::empty())?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn decrypt(input: &PathBuf, output: &PathBuf, password: &str) -> Result<()> {
    let doc = load(input, password)?;
    if !doc.is_owner_password(password) {
        bail!("The supplied password is not the owner password");
    }
    doc.remove_security()?;
    doc.save_as_path(output, SaveFlags::empty())?;
    println!("Wrote {}", output.display());
    Ok(())
}

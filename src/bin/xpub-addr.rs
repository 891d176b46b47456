// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate amplify;

use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use colored::Colorize;
use serde_crate::Serialize;
use slip132::ToSlip132;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use xpubderive::{
    AccountXpub, AddressDeriver, DerivationTemplate, DerivedAddress, IndexRange, KeyApplication,
    RangeError, UnhardenedIndex,
};

/// Command-line arguments
#[derive(Parser)]
#[derive(Clone, Eq, PartialEq, Debug)]
#[clap(
    author,
    version,
    name = "xpub-addr",
    about = "Command-line tool deriving bitcoin addresses from xpub and zpub extended public keys"
)]
pub struct Args {
    /// Command to execute
    #[clap(subcommand)]
    pub command: Command,

    /// Increase verbosity of the log messages printed to STDERR; can be
    /// repeated. Overrides `RUST_LOG` environment variable.
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Command to execute
#[derive(Subcommand)]
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Command {
    /// Derive addresses from an extended public key.
    ///
    /// Legacy (P2PKH) addresses are produced for `xpub` keys and native
    /// segwit (P2WPKH) addresses for `zpub` keys.
    Derive {
        /// Base58-encoded extended public key (`xpub` or `zpub`)
        key: String,

        /// Derivation template, with `x` standing for the final index
        #[clap(short, long, default_value = "m/0/x")]
        path: String,

        /// Number of addresses to derive
        #[clap(short = 'n', long, default_value = "20")]
        count: u32,

        /// Number of addresses to skip
        #[clap(short, long, default_value = "0")]
        skip: UnhardenedIndex,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: Format,

        /// Print derived child extended public keys together with addresses
        #[clap(long)]
        xpub: bool,

        /// Override key application defined by the key version, producing
        /// `legacy` addresses from a `zpub` or `segwit` addresses from an
        /// `xpub`
        #[clap(short, long)]
        application: Option<KeyApplication>,
    },

    /// Get info about extended public key data
    Info {
        /// Base58-encoded extended public key
        key: String,
    },

    /// Check derivation template syntax
    Validate {
        /// Derivation template like `m/0/x`
        path: String,
    },
}

/// Format for the derived addresses
#[derive(ValueEnum)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Format {
    /// One line per address with derivation path
    #[default]
    Text,

    /// YAML document with all derivation details
    Yaml,
}

#[derive(Debug, Display, Error, From)]
#[display(inner)]
pub enum Error {
    #[from]
    Derivation(xpubderive::Error),

    #[from]
    Range(RangeError),

    #[from]
    Yaml(serde_yaml::Error),

    /// derivation range is empty: `--count` must be greater than zero
    #[display(doc_comments)]
    EmptyRange,
}

impl From<slip132::Error> for Error {
    fn from(err: slip132::Error) -> Self { Error::Derivation(err.into()) }
}

impl From<xpubderive::PathError> for Error {
    fn from(err: xpubderive::PathError) -> Self { Error::Derivation(err.into()) }
}

impl From<xpubderive::DeriveError> for Error {
    fn from(err: xpubderive::DeriveError) -> Self { Error::Derivation(err.into()) }
}

impl Error {
    fn kind(&self) -> Option<xpubderive::ErrorKind> {
        match self {
            Error::Derivation(err) => Some(err.kind()),
            Error::Range(err) => Some(err.kind()),
            Error::Yaml(_) | Error::EmptyRange => None,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "serde_crate", rename_all = "camelCase")]
struct AddressRecord {
    #[serde(flatten)]
    derived: DerivedAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    xpub: Option<String>,
}

fn yaml_records(
    addresses: Vec<DerivedAddress>,
    xpubs: Vec<Option<String>>,
) -> Result<String, serde_yaml::Error> {
    let records = addresses
        .into_iter()
        .zip(xpubs)
        .map(|(derived, xpub)| AddressRecord { derived, xpub })
        .collect::<Vec<_>>();
    serde_yaml::to_string(&records)
}

impl Args {
    fn init_tracing(&self) {
        let filter = match self.verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
            1 => "debug".into(),
            _ => "trace".into(),
        };
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    pub fn exec(&self) -> Result<(), Error> {
        match &self.command {
            Command::Derive {
                key,
                path,
                count,
                skip,
                format,
                xpub,
                application,
            } => self.derive(key, path, *count, *skip, *format, *xpub, *application),
            Command::Info { key } => self.info(key),
            Command::Validate { path } => self.validate(path),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn derive(
        &self,
        key: &str,
        path: &str,
        count: u32,
        skip: UnhardenedIndex,
        format: Format,
        show_xpub: bool,
        application: Option<KeyApplication>,
    ) -> Result<(), Error> {
        let mut xpub = AccountXpub::from_str(key)?;
        if let Some(application) = application {
            xpub = AccountXpub::with(*xpub.as_xpub(), application);
        }
        let template = DerivationTemplate::from_str(path)?;
        let range = IndexRange::with_count(skip, count).ok_or(Error::EmptyRange)?;
        let deriver = AddressDeriver::new(xpub, template)?;

        let addresses = deriver.derive_range(&range)?;
        let xpubs = if show_xpub {
            range
                .iter()
                .map(|index| deriver.derive_key(index).map(|key| Some(key.to_string())))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            vec![None; addresses.len()]
        };

        match format {
            Format::Text => {
                eprintln!(
                    "{} {} ({}) using {}\n",
                    "Deriving".bright_white(),
                    range.to_string().yellow(),
                    xpub.application(),
                    deriver.template().to_string().yellow()
                );
                for (derived, xpub) in addresses.iter().zip(&xpubs) {
                    println!("{:>6} {}", derived.path.to_string().dimmed(), derived.address);
                    if let Some(xpub) = xpub {
                        println!("{:>6} {}", "", xpub.dimmed());
                    }
                }
                println!();
            }
            Format::Yaml => println!("{}", yaml_records(addresses, xpubs)?),
        }

        Ok(())
    }

    fn info(&self, key: &str) -> Result<(), Error> {
        let xpub = AccountXpub::from_str(key)?;
        println!();
        println!("{:-13} {}", "Fingerprint:", xpub.fingerprint());
        println!("{:-13} {}", "Identifier:", xpub.identifier());
        println!("{:-13} {}", "Application:", xpub.application());
        println!(
            "{:-13} {}  # (account 0)",
            "Derivation:",
            xpub.application().to_derivation_path()
        );
        println!("{:-13} {}", "Public key:", xpub.public_key());
        println!("{:-13} {}", "Chain code:", xpub.chain_code());
        println!("{:-13} {}", "Depth:", xpub.depth());
        println!("{:-13} {:#}", "Child number:", xpub.child_number());
        println!("Variants:");
        for app in KeyApplication::ALL {
            println!("  - {}", xpub.as_xpub().to_slip132_string(app));
        }
        println!();

        Ok(())
    }

    fn validate(&self, path: &str) -> Result<(), Error> {
        let template = DerivationTemplate::from_str(path)?;
        println!(
            "{} {}",
            "Valid derivation template".bright_green(),
            template.to_string().bright_white()
        );
        println!("{:-13} {:?}", "Indexes:", template.to_u32_vec());
        println!("{:-13} {}", "Depth:", template.depth());
        println!();
        Ok(())
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    args.init_tracing();
    if let Err(err) = args.exec() {
        match err.kind() {
            Some(kind) => eprintln!("{} ({}): {}\n", "Error".bright_red(), kind, err),
            None => eprintln!("{}: {}\n", "Error".bright_red(), err),
        }
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod test {
    use super::*;

    const XPUB: &str = "xpub661MyMwAqRbcGYzUcVc8JSnN3RcM47JHWMaqtE8yhMfHZohujgvQjX2ezdw2qw6sSMu8B694BQebnASCNvbkZWiBVRvFimSAwgVphguL6LD";

    #[test]
    fn derive_args() {
        let args = Args::try_parse_from(["xpub-addr", "-v", "derive", XPUB, "-n", "5"]).unwrap();
        assert_eq!(args.verbose, 1);
        assert_eq!(args.command, Command::Derive {
            key: XPUB.to_owned(),
            path: s!("m/0/x"),
            count: 5,
            skip: UnhardenedIndex::ZERO,
            format: Format::Text,
            xpub: false,
            application: None,
        });

        let args = Args::try_parse_from([
            "xpub-addr",
            "derive",
            XPUB,
            "--application",
            "segwit",
            "--format",
            "yaml",
            "-s",
            "10",
        ])
        .unwrap();
        let Command::Derive {
            application,
            format,
            skip,
            ..
        } = args.command
        else {
            panic!("derive command expected")
        };
        assert_eq!(application, Some(KeyApplication::SegWit));
        assert_eq!(format, Format::Yaml);
        assert_eq!(skip, UnhardenedIndex::from(10u8));

        assert!(Args::try_parse_from(["xpub-addr", "derive", XPUB, "-a", "bip49"]).is_err());
        assert!(Args::try_parse_from(["xpub-addr", "derive", XPUB, "-s", "2147483648"]).is_err());
    }

    #[test]
    fn yaml_output() {
        let deriver = AddressDeriver::parse(XPUB, "m/0/x").unwrap();
        let range = IndexRange::with_count(UnhardenedIndex::ZERO, 2).unwrap();
        let addresses = deriver.derive_range(&range).unwrap();
        let xpub = deriver.derive_key(UnhardenedIndex::ZERO).unwrap().to_string();

        let yaml = yaml_records(addresses, vec![Some(xpub.clone()), None]).unwrap();
        let records: Vec<serde_yaml::Mapping> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first["application"], "bip44");
        assert_eq!(first["index"], 0);
        assert_eq!(first["path"], "m/0/0");
        assert_eq!(first["address"], "1LxgPnAfW5QHJ5GTp8cnaXENYRDDjgs9ZL");
        assert_eq!(first["xpub"], xpub.as_str());

        let second = &records[1];
        assert_eq!(second["path"], "m/0/1");
        assert_eq!(second["address"], "18Pce7DtX7L2SKg9WMphHzCMX4zLyDTd9r");
        assert!(!second.contains_key("xpub"));
    }
}

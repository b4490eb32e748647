//! [`Args`] definitions.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

/// Remaining useful life assessment and offer management.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    /// [`Command`] to execute.
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Parses command line arguments.
    ///
    /// # Errors
    ///
    /// Errors if failed to parse command line arguments.
    pub fn parse() -> Result<Self, clap::Error> {
        <Self as Parser>::try_parse()
    }
}

/// Top-level command.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Applies pending database migrations.
    Migrate,

    /// Applies pending database migrations and runs background tasks until
    /// terminated.
    Run,

    /// Prints the reference data a calculation input is composed of.
    Meta,

    /// Calculates a remaining useful life out of the JSON input.
    Calculate {
        /// Path to the JSON input, or `-` to read it from STDIN.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Offer operations.
    #[command(subcommand)]
    Offer(OfferCommand),

    /// Reference data administration.
    #[command(subcommand)]
    Admin(AdminCommand),
}

/// Offer operation.
#[derive(Debug, Subcommand)]
pub enum OfferCommand {
    /// Prints the offer accessible by the view token.
    Show {
        /// View token of the offer.
        token: String,
    },

    /// Creates an offer for a calculation out of the JSON input, or updates
    /// the existing one.
    Create {
        /// Path to the JSON input, or `-` to read it from STDIN.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Selects a package, or deselects it if none is provided.
    Package {
        /// View token of the offer.
        token: String,

        /// Key of the package to select.
        #[arg(long)]
        key: Option<String>,
    },

    /// Applies a discount code, or removes the applied one if none is
    /// provided.
    Discount {
        /// View token of the offer.
        token: String,

        /// Discount code to apply.
        #[arg(long)]
        code: Option<String>,
    },

    /// Replaces the billing address with the one of the JSON input.
    Billing {
        /// View token of the offer.
        token: String,

        /// Path to the JSON input, or `-` to read it from STDIN.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Confirms the offer.
    Confirm {
        /// View token of the offer.
        token: String,
    },

    /// Overrides the base price of the offer, or makes it priced on request
    /// if no price is provided.
    Price {
        /// ID of the offer.
        id: String,

        /// Base price in euros.
        #[arg(long)]
        price: Option<Decimal>,
    },
}

/// Reference data administration operation.
#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Creates or updates a property type out of the JSON input.
    PropertyType {
        /// Path to the JSON input, or `-` to read it from STDIN.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Creates or updates a pricing entry out of the JSON input.
    Pricing {
        /// Path to the JSON input, or `-` to read it from STDIN.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Creates or updates a formula set out of the JSON input.
    Formula {
        /// Path to the JSON input, or `-` to read it from STDIN.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Creates or updates a discount code out of the JSON input.
    DiscountCode {
        /// Path to the JSON input, or `-` to read it from STDIN.
        #[arg(default_value = "-")]
        input: String,
    },

    /// Deletes a discount code.
    DeleteDiscountCode {
        /// Discount code to delete.
        code: String,
    },
}

use clap::{Parser, Subcommand};

/// faas-kit: secrets, params and templated service calls for serverless functions
#[derive(Parser)]
#[command(name = "faas-kit", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the function host
    Serve {
        /// Port to bind (defaults to FAAS_PORT or 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print a secret from the secrets directory
    Secret { name: String },

    /// Read a secret from the vault
    Vault { name: String },

    /// Render a template against JSON data
    Render {
        #[arg(long)]
        template: String,
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Call a vault-described service
    Call {
        service: String,
        /// JSON data substituted into the service's data template
        #[arg(long, default_value = "{}")]
        data: String,
        /// Print the resolved descriptor instead of sending the request
        #[arg(long)]
        dry_run: bool,
    },

    /// Send an event payload to the event sink
    Event {
        #[arg(long)]
        data: String,
    },
}

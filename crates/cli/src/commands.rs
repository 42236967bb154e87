use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Create missing leases p-0..p-N
    Seed {
        #[arg(long, help = "Number of partitions")]
        partitions: usize,

        #[arg(long, help = "Lease store directory (defaults to ~/.leasefeed/leases)")]
        store: Option<PathBuf>,
    },
    /// Show every lease in the store
    Leases {
        #[arg(long, help = "Lease store directory (defaults to ~/.leasefeed/leases)")]
        store: Option<PathBuf>,

        #[arg(long, help = "Print the leases as JSON instead of a table")]
        json: bool,
    },
    /// Acquire free leases and consume their partitions until interrupted
    Run {
        #[arg(long, help = "Owner name written into acquired leases")]
        owner: String,

        #[arg(long, help = "Lease store directory (defaults to ~/.leasefeed/leases)")]
        store: Option<PathBuf>,

        #[arg(long, help = "JSON processor settings file")]
        settings: Option<PathBuf>,

        #[arg(
            long,
            default_value_t = 10,
            help = "Pages the synthetic feed produces per partition before going idle"
        )]
        pages: u64,

        #[arg(long, default_value_t = 25, help = "Records per synthetic page")]
        page_size: u64,

        #[arg(
            long,
            help = "Read never-checkpointed partitions from the beginning instead of the settings' start_from"
        )]
        from_beginning: bool,
    },
    /// Report how many synthetic changes each partition still has to process
    Estimate {
        #[arg(long, help = "Lease store directory (defaults to ~/.leasefeed/leases)")]
        store: Option<PathBuf>,

        #[arg(long, help = "JSON processor settings file")]
        settings: Option<PathBuf>,

        #[arg(long, default_value_t = 10, help = "Pages of the synthetic feed per partition")]
        pages: u64,

        #[arg(long, default_value_t = 25, help = "Records per synthetic page")]
        page_size: u64,

        #[arg(long, help = "Print the report as JSON instead of a table")]
        json: bool,

        #[arg(long, help = "Keep reporting every estimation period until interrupted")]
        watch: bool,
    },
}

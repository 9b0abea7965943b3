use clap::Parser;
use election_core::ClientMessage;
use election_cli::ConnectArgs;

/// Register a new election with the cluster.
#[derive(Parser)]
#[command(about = "Register an election")]
struct Cli {
    /// Unique election id.
    #[arg(long)]
    id: String,

    /// Candidates to vote for.
    #[arg(long, num_args = 1.., required = true)]
    candidates: Vec<String>,

    /// Users authorized to vote.
    #[arg(long, num_args = 1.., required = true)]
    authorized_users: Vec<String>,

    #[command(flatten)]
    connect: ConnectArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();

    let leader = cli.connect.resolve_leader()?;
    let msg = ClientMessage::Election {
        id: cli.id,
        candidates: cli.candidates,
        authorized_users: cli.authorized_users,
    };
    let reply = election_cli::send_msg(&leader, &msg)?;
    println!("{reply}");
    Ok(())
}

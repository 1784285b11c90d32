use argh::FromArgs;
mod cmd_eval;
mod cmd_learn;

#[derive(FromArgs)]
/// A phonological rule learner
struct Args {
    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(FromArgs)]
/// learn or evaluate
#[argh(subcommand)]
enum Subcommand {
    Learn(cmd_learn::Learn),
    Eval(cmd_eval::Eval),
}

impl Subcommand {
    fn run(self) -> anyhow::Result<()> {
        match self {
            Subcommand::Learn(cmd) => cmd.run(),
            Subcommand::Eval(cmd) => cmd.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    argh::from_env::<Args>().subcommand.run()
}

mod command;
mod schema;
mod util;

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    command::run()
}

mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;
mod nebline;
mod providers;

use error::AiError;

fn main() {
    env_loader::load_dotenv();

    match cli::run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            match err.chain().find_map(|cause| cause.downcast_ref::<AiError>()) {
                Some(ai) => eprintln!("error[{}]: {err:#}", ai.kind().as_str()),
                None => eprintln!("error: {err:#}"),
            }
            std::process::exit(1);
        }
    }
}

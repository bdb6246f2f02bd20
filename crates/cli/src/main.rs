//! forge_ide CLI entry point.

use anyhow::Result;
use clap::Parser;

use forge_ide_cli::{
    init_config, run_completions_command, run_doctor_command, run_list_tools_command,
    run_mcp_server_command, run_run_command, run_version_command, Args, Command,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let workspace_root = match &args.command {
        Command::Run(run_args) => std::path::PathBuf::from(&run_args.working_dir),
        Command::McpServer(mcp_args) => {
            std::path::PathBuf::from(mcp_args.working_dir.as_deref().unwrap_or("."))
        }
        Command::Doctor(doctor_args) => {
            std::path::PathBuf::from(doctor_args.working_dir.as_deref().unwrap_or("."))
        }
        Command::ListTools(_) | Command::Completions(_) | Command::Version(_) => {
            std::path::PathBuf::from(".")
        }
    };
    init_config(&args, &workspace_root);

    match args.command {
        Command::Run(run_args) => {
            let code = run_run_command(&run_args).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Command::ListTools(list_args) => {
            run_list_tools_command(&list_args);
        }
        Command::McpServer(mcp_args) => {
            run_mcp_server_command(&mcp_args).await?;
        }
        Command::Completions(completions_args) => {
            run_completions_command(&completions_args);
        }
        Command::Version(version_args) => {
            run_version_command(&version_args);
        }
        Command::Doctor(doctor_args) => {
            let exit_code = run_doctor_command(&doctor_args);
            if exit_code.code() != 0 {
                std::process::exit(exit_code.code());
            }
        }
    }

    Ok(())
}

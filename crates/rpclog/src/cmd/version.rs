use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("rpclog {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: rpclog");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("format_version: {}", rpclog_codec::FORMAT_VERSION);
    println!(
        "target: {}",
        option_env!("RPCLOG_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("RPCLOG_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("features: json={}, cli=true", cfg!(feature = "json"));

    Ok(SUCCESS)
}

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("knitlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: knitlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("KNITLINK_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: async={}, serde={}, cli=true",
        cfg!(feature = "async"),
        cfg!(feature = "serde")
    );
    println!("default_baud: 115200");

    Ok(SUCCESS)
}

use knitlink_proto::MessageKind;

use crate::cmd::query::checksum_exit;
use crate::cmd::{await_reply, parse_duration, Context, PeekArgs, PokeArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_message, print_sent};

pub fn peek(args: PeekArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.wait.timeout)?;
    let mut session = ctx.open_session()?;
    session
        .peek(args.address)
        .map_err(|err| session_error("send failed", err))?;

    let reply = await_reply(&mut session, MessageKind::DebugPeekConfirm, timeout)?;
    print_message(&reply, ctx.format);
    Ok(checksum_exit(&reply))
}

pub fn poke(args: PokeArgs, ctx: &Context) -> CliResult<i32> {
    let mut session = ctx.open_session()?;
    session
        .poke(args.address, args.value)
        .map_err(|err| session_error("send failed", err))?;
    print_sent(
        &knitlink_proto::Message::DebugPokeRequest(knitlink_proto::PokeRequest {
            address: args.address,
            value: args.value,
        }),
        &ctx.port.display().to_string(),
        ctx.format,
    );
    Ok(SUCCESS)
}

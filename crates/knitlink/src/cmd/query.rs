use knitlink_proto::MessageKind;
use tracing::warn;

use crate::cmd::{await_reply, parse_duration, Context, WaitArgs};
use crate::exit::{session_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::print_message;

pub fn info(args: WaitArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut session = ctx.open_session()?;
    session
        .request_info()
        .map_err(|err| session_error("send failed", err))?;

    let reply = await_reply(&mut session, MessageKind::ConfirmInfo, timeout)?;
    print_message(&reply, ctx.format);
    Ok(checksum_exit(&reply))
}

pub fn state(args: WaitArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut session = ctx.open_session()?;
    session
        .request_state()
        .map_err(|err| session_error("send failed", err))?;

    let reply = await_reply(&mut session, MessageKind::IndicateState, timeout)?;
    print_message(&reply, ctx.format);
    Ok(checksum_exit(&reply))
}

/// A corrupt reply is still printed, but the command reports it.
pub(crate) fn checksum_exit(reply: &knitlink_proto::Decoded) -> i32 {
    if reply.is_corrupt() {
        warn!(kind = ?reply.kind(), "reply failed its checksum");
        DATA_INVALID
    } else {
        SUCCESS
    }
}

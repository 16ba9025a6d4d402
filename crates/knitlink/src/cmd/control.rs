use knitlink_proto::{Message, MessageKind, RequestInit, RequestStart, WireVariant};
use knitlink_session::confirm_ok;
use tracing::warn;

use crate::cmd::query::checksum_exit;
use crate::cmd::{await_reply, parse_duration, Context, InitArgs, StartArgs};
use crate::exit::{session_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_message, print_sent};

pub fn reset(ctx: &Context) -> CliResult<i32> {
    let mut session = ctx.open_session()?;
    session
        .request_reset()
        .map_err(|err| session_error("send failed", err))?;
    print_sent(&Message::RequestReset, &ctx.port.display().to_string(), ctx.format);
    Ok(SUCCESS)
}

pub fn init(args: InitArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.wait.timeout)?;
    let mut session = ctx.open_session()?;
    session
        .send(&Message::RequestInit(RequestInit {
            machine: args.machine.into(),
        }))
        .map_err(|err| session_error("send failed", err))?;

    let reply = await_reply(&mut session, MessageKind::ConfirmInit, timeout)?;
    print_message(&reply, ctx.format);
    Ok(confirm_exit(&reply))
}

pub fn start(args: StartArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.wait.timeout)?;
    let machine = match ctx.variant {
        WireVariant::Legacy => Some(args.machine.into()),
        WireVariant::Current => None,
    };

    let mut session = ctx.open_session()?;
    session
        .send(&Message::RequestStart(RequestStart {
            start_needle: args.start_needle,
            stop_needle: args.stop_needle,
            continuous_reporting: args.continuous,
            machine,
        }))
        .map_err(|err| session_error("send failed", err))?;

    let reply = await_reply(&mut session, MessageKind::ConfirmStart, timeout)?;
    print_message(&reply, ctx.format);
    Ok(confirm_exit(&reply))
}

fn confirm_exit(reply: &knitlink_proto::Decoded) -> i32 {
    let code = checksum_exit(reply);
    if code != SUCCESS {
        return code;
    }
    if confirm_ok(reply) == Some(false) {
        warn!(kind = ?reply.kind(), "controller reported an error");
        return FAILURE;
    }
    SUCCESS
}

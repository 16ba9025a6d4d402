use knitlink_proto::{LineFlags, NeedleSelection};

use crate::cmd::{Context, LineArgs};
use crate::exit::{proto_error, session_error, CliResult, SUCCESS};
use crate::output::print_sent;

pub fn run(args: LineArgs, ctx: &Context) -> CliResult<i32> {
    let needles = selection(&args)?;
    let flags = if args.last {
        LineFlags::LAST_LINE
    } else {
        LineFlags::NONE
    };
    let message = knitlink_proto::Message::ConfirmLine(knitlink_proto::ConfirmLine {
        line_number: args.line_number,
        needles,
        flags,
        color: args.color,
    });

    let mut session = ctx.open_session()?;
    session
        .send(&message)
        .map_err(|err| session_error("send failed", err))?;
    print_sent(&message, &ctx.port.display().to_string(), ctx.format);
    Ok(SUCCESS)
}

fn selection(args: &LineArgs) -> CliResult<NeedleSelection> {
    if let Some(pattern) = args.pattern {
        return Ok(pattern.selection());
    }
    let needles = args.needles.iter().flatten().copied();
    NeedleSelection::from_needles(needles).map_err(|err| proto_error("invalid --needles", err))
}

use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Prints an error block to stderr: a bold red `[Error: header]` line followed by the body.
pub fn log_error(header: impl AsRef<str>, body: impl AsRef<str>) {
    let mut stream = StandardStream::stderr(ColorChoice::Always);
    write_block(
        &mut stream,
        &format!("\n[Error: {}]", header.as_ref()),
        body.as_ref(),
        Color::Red,
    );
}

/// Prints a warning block to stderr: a bold yellow `[Warning: header]` line followed by the body.
pub fn log_warning(header: impl AsRef<str>, body: impl AsRef<str>) {
    let mut stream = StandardStream::stderr(ColorChoice::Always);
    write_block(
        &mut stream,
        &format!("\n[Warning: {}]", header.as_ref()),
        body.as_ref(),
        Color::Yellow,
    );
}

/// Prints a section header to stdout, used once at the start of each buildpack phase.
pub fn log_header(title: impl AsRef<str>) {
    let mut stream = StandardStream::stdout(ColorChoice::Always);
    // Output is best effort.
    let _ = write_styled_lines(
        &mut stream,
        &format!("\n[{}]", title.as_ref()),
        ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true),
    )
    .and_then(|()| stream.flush());
}

/// Prints a plain informational line to stdout.
pub fn log_info(message: impl AsRef<str>) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", message.as_ref()).and_then(|()| stdout.flush());
}

fn write_block(stream: &mut StandardStream, header: &str, body: &str, color: Color) {
    let _ = write_styled_lines(
        stream,
        header,
        ColorSpec::new().set_fg(Some(color)).set_bold(true),
    )
    .and_then(|()| write_styled_lines(stream, body, ColorSpec::new().set_fg(Some(color))))
    .and_then(|()| stream.flush());
}

// Each line is styled and reset separately so that prefixes the platform adds to streamed output
// (for example `remote:`) don't inherit the color.
fn write_styled_lines<W: WriteColor>(
    stream: &mut W,
    message: &str,
    spec: &ColorSpec,
) -> io::Result<()> {
    // `split('\n')` instead of `lines()` to keep trailing empty lines the caller asked for.
    for line in message.split('\n') {
        stream.set_color(spec)?;
        write!(stream, "{line}")?;
        stream.reset()?;
        writeln!(stream)?;
    }
    Ok(())
}

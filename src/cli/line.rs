use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

/// Sends every line of `input` to `addr` and writes each reply to `output`
/// as `Server: <reply>`. Returns when `input` ends or the server hangs up.
pub fn run_line_client(addr: &str, input: impl BufRead, mut output: impl Write) -> io::Result<()> {
    let mut stream = TcpStream::connect(addr)?;
    let mut replies = BufReader::new(stream.try_clone()?);

    for line in input.lines() {
        let line = line?;
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;

        let mut reply = String::new();
        if replies.read_line(&mut reply)? == 0 {
            writeln!(output, "Server closed the connection")?;
            break;
        }
        writeln!(output, "Server: {}", reply.trim_end())?;
    }
    Ok(())
}

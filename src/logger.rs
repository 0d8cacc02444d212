// This is a trimmed down version of pretty_env_logger v0.4.0 that uses Builder::from_env()

use env_logger::{
    fmt::{Color, Style, StyledValue},
    Builder, Env,
};
use log::Level;

pub fn init(level: &str) {
    let env = Env::default().filter_or("RUST_LOG", level);

    Builder::from_env(env)
        .format(|buf, record| {
            use std::io::Write;

            let mut style = buf.style();
            let level = colored_level(&mut style, record.level());
            let time = buf.timestamp_millis();

            writeln!(buf, "{} {} > {}", time, level, record.args())
        })
        .init();
}

fn colored_level(style: &'_ mut Style, level: Level) -> StyledValue<'_, &'static str> {
    match level {
        Level::Trace => style.set_color(Color::Magenta).value("TRACE"),
        Level::Debug => style.set_color(Color::Blue).value("DEBUG"),
        Level::Info => style.set_color(Color::Green).value("INFO "),
        Level::Warn => style.set_color(Color::Yellow).value("WARN "),
        Level::Error => style.set_color(Color::Red).value("ERROR"),
    }
}

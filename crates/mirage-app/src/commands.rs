//! Line commands for the headless driver.

use anyhow::{Result, anyhow, bail};
use mirage_desktop::DesktopView;
use mirage_types::{Point, WidgetRequest};

use crate::app_state::AppState;

/// What the loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutput {
    Lines(Vec<String>),
    None,
    Quit,
}

impl CommandOutput {
    fn line(text: impl Into<String>) -> Self {
        Self::Lines(vec![text.into()])
    }
}

pub const HELP: &str = "\
commands:
  ls [path]                list a directory (default: Desktop)
  cat <path>               print a file
  write <path> <text...>   create or overwrite a file
  mkdir <path>             create a directory
  rm <path>                delete a file or directory tree
  mv <from> <to>           move an entry
  layout                   show icon positions
  viewport <w> <h>         resize the desktop container
  drag <name> <x> <y>      drag an icon and drop its corner at (x, y)
  lock | unlock | reset    layout commands
  widget [type] [x y]      place a widget
  wallpaper [name]         show or set the wallpaper
  save                     persist the workspace
  quit";

/// Run one input line against the app.
pub fn execute(line: &str, app: &AppState) -> Result<CommandOutput> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(CommandOutput::None);
    };
    let args: Vec<&str> = words.collect();

    let output = match (cmd, args.as_slice()) {
        ("help", _) => CommandOutput::Lines(HELP.lines().map(String::from).collect()),
        ("ls", rest) => {
            let path = rest
                .first()
                .map_or_else(|| app.config.desktop_root.clone(), |p| app.resolve(p));
            let lines = app
                .vfs
                .read_dir(&path)
                .into_iter()
                .map(|e| {
                    if e.is_dir() {
                        format!("{}/", e.name)
                    } else {
                        e.name
                    }
                })
                .collect();
            CommandOutput::Lines(lines)
        },
        ("cat", [path]) => {
            let text = app.vfs.read_file(&app.resolve(path))?;
            CommandOutput::Lines(text.lines().map(String::from).collect())
        },
        ("write", [path, text @ ..]) => {
            app.vfs.write_file(&app.resolve(path), &text.join(" "))?;
            CommandOutput::None
        },
        ("mkdir", [path]) => {
            app.vfs.mkdir(&app.resolve(path))?;
            CommandOutput::None
        },
        ("rm", [path]) => {
            let removed = app.vfs.delete(&app.resolve(path))?;
            CommandOutput::line(format!("removed {removed} entr{}", plural_y(removed)))
        },
        ("mv", [from, to]) => {
            app.vfs.move_entry(&app.resolve(from), &app.resolve(to))?;
            CommandOutput::None
        },
        ("layout", []) => CommandOutput::Lines(describe(&app.desktop.render())),
        ("viewport", [w, h]) => {
            app.desktop.set_viewport(w.parse()?, h.parse()?);
            CommandOutput::Lines(describe(&app.desktop.render()))
        },
        ("drag", [name, x, y]) => {
            let to = Point::new(x.parse()?, y.parse()?);
            let from = app
                .desktop
                .render()
                .icon(name)
                .map(|i| i.position)
                .ok_or_else(|| anyhow!("no icon named {name}"))?;
            match app.desktop.drag_icon(name, from, to) {
                Some(p) => CommandOutput::line(format!("{name} -> ({}, {})", p.x, p.y)),
                None => CommandOutput::line("layout is locked"),
            }
        },
        ("lock", []) => {
            app.desktop.lock_layout();
            CommandOutput::line("layout locked")
        },
        ("unlock", []) => {
            app.desktop.unlock_layout();
            CommandOutput::line("layout unlocked")
        },
        ("reset", []) => {
            app.desktop.reset_layout();
            CommandOutput::Lines(describe(&app.desktop.render()))
        },
        ("widget", rest) => {
            let request = widget_request(rest)?;
            let id = app.desktop.spawn_widget(&request);
            let widget = app
                .desktop
                .widgets()
                .widget(&id)
                .ok_or_else(|| anyhow!("widget {id} vanished"))?;
            CommandOutput::line(format!(
                "{id} ({}) at ({}, {})",
                widget.kind, widget.x, widget.y
            ))
        },
        ("wallpaper", []) => CommandOutput::line(app.desktop.widgets().wallpaper()),
        ("wallpaper", [name]) => {
            app.desktop.widgets().set_wallpaper(name);
            CommandOutput::None
        },
        ("save", []) => {
            app.save()?;
            CommandOutput::line("saved")
        },
        ("quit" | "exit", []) => CommandOutput::Quit,
        (other, _) => bail!("unknown command or bad arguments: {other} (try 'help')"),
    };
    Ok(output)
}

fn widget_request(args: &[&str]) -> Result<WidgetRequest> {
    let (widget_type, coords) = match args {
        [] => (None, &args[..]),
        [first, rest @ ..] if first.parse::<i32>().is_err() => (Some(first.to_string()), rest),
        _ => (None, args),
    };
    let (x, y) = match coords {
        [] => (None, None),
        [x, y] => (Some(x.parse()?), Some(y.parse()?)),
        _ => bail!("usage: widget [type] [x y]"),
    };
    Ok(WidgetRequest { x, y, widget_type })
}

fn plural_y(n: usize) -> &'static str {
    if n == 1 { "y" } else { "ies" }
}

/// Text rendering of one desktop render pass.
pub fn describe(view: &DesktopView) -> Vec<String> {
    let mut lines = vec![format!(
        "{}x{} {:?}{} wallpaper={}",
        view.viewport.width,
        view.viewport.height,
        view.mode,
        if view.locked { " [locked]" } else { "" },
        view.wallpaper
    )];
    for icon in &view.icons {
        let marker = if icon.overridden { "*" } else { " " };
        lines.push(format!(
            "{marker} ({:>4}, {:>4}) {}",
            icon.position.x, icon.position.y, icon.name
        ));
    }
    for widget in &view.widgets {
        lines.push(format!(
            "  [{}] {} at ({}, {})",
            widget.id, widget.kind, widget.x, widget.y
        ));
    }
    lines
}

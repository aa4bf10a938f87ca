use crate::arch::eyeriss::eyeriss::Eyeriss;
use crate::arch::eyeriss::instruction::{Instruction, Unit};
use crate::arch::eyeriss::message::Message;
use crate::arch::eyeriss::pe::Endpoint;
use crate::error::{EyerissError, Result};
use crate::simulator::utils::report::{format_cost_report, format_matrix, format_snapshot};
use crate::simulator::workload::{synthetic_image, Workload};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;

pub const HELP: &str = "\
commands:
  filter              load the workload kernel
  image [R C]         load a synthetic R x C image (default: largest that fits)
  compute             run the convolution and print the result
  reset               forget loaded operands
  ready               show whether compute can run
  pe R C              show the scratchpads of PE (R, C)
  diag R C            list the up-right diagonal from PE (R, C)
  send R C INSTR ...  deliver one instruction, e.g. 'send 0 0 PE_READ_PSUM 0 0'
                      (GLB_* instructions go to the global buffer)
  stats               print the cost report
  help                this text
  q                   quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  Filter,
  Image(Option<(usize, usize)>),
  Compute,
  Reset,
  Ready,
  Pe(usize, usize),
  Diag(usize, usize),
  Send(usize, usize, Instruction),
  Stats,
  Help,
  Quit,
}

fn parse_coord(args: &[&str], what: &str) -> std::result::Result<(usize, usize), String> {
  if args.len() < 2 {
    return Err(format!("'{}' requires a row and a column, e.g. '{} 0 1'", what, what));
  }
  let parse = |s: &str| s.parse::<usize>().map_err(|e| format!("invalid number '{}': {}", s, e));
  Ok((parse(args[0])?, parse(args[1])?))
}

pub fn parse_command(line: &str) -> std::result::Result<Command, String> {
  let parts: Vec<&str> = line.split_whitespace().collect();
  let Some((&head, args)) = parts.split_first() else {
    return Ok(Command::Help);
  };

  match head {
    "filter" => Ok(Command::Filter),
    "image" => {
      if args.is_empty() {
        Ok(Command::Image(None))
      } else {
        parse_coord(args, "image").map(|size| Command::Image(Some(size)))
      }
    },
    "compute" => Ok(Command::Compute),
    "reset" => Ok(Command::Reset),
    "ready" => Ok(Command::Ready),
    "pe" => parse_coord(args, "pe").map(|(r, c)| Command::Pe(r, c)),
    "diag" => parse_coord(args, "diag").map(|(r, c)| Command::Diag(r, c)),
    "send" => {
      let (r, c) = parse_coord(args, "send")?;
      let inst = Instruction::parse(&args[2..].join(" ")).map_err(|e| e.to_string())?;
      Ok(Command::Send(r, c, inst))
    },
    "stats" => Ok(Command::Stats),
    "help" | "h" => Ok(Command::Help),
    "q" | "quit" => Ok(Command::Quit),
    other => Err(format!("Unknown command: '{}'. Type 'help' for the command list", other)),
  }
}

/// Run one command and return what it prints
pub fn execute<E: Endpoint>(eyeriss: &mut Eyeriss<E>, workload: &Workload, command: &Command) -> Result<String> {
  match command {
    Command::Filter => {
      eyeriss.set_filter(workload.kernel.view())?;
      Ok(format!("filter {:?} loaded", workload.kernel.dim()))
    },
    Command::Image(size) => {
      let (rows, cols) = match size {
        Some(size) => *size,
        None => {
          let (fr, _) = eyeriss.filter_shape().ok_or(EyerissError::NotReady {
            filter_loaded: false,
            image_loaded: eyeriss.image_shape().is_some(),
          })?;
          let (_, array_cols) = eyeriss.size();
          (fr + array_cols - 1, eyeriss.noc().pe_config().word_size)
        },
      };
      eyeriss.set_image(synthetic_image(rows, cols).view())?;
      Ok(format!("image ({}, {}) loaded", rows, cols))
    },
    Command::Compute => Ok(format_matrix(&eyeriss.compute()?)),
    Command::Reset => {
      eyeriss.reset();
      Ok("reset".to_string())
    },
    Command::Ready => Ok(format!(
      "ready={} filter={:?} image={:?}",
      eyeriss.is_ready(),
      eyeriss.filter_shape(),
      eyeriss.image_shape()
    )),
    Command::Pe(r, c) => Ok(format_snapshot(&eyeriss.snapshot((*r, *c))?)),
    Command::Diag(r, c) => Ok(format!("{:?}", eyeriss.noc().diagonal_connections((*r, *c))?)),
    Command::Send(r, c, inst) => {
      let message = Message::new(inst.clone());
      let reply = if inst.unit() == Unit::GlobalBuffer {
        eyeriss.noc_mut().execute_glb(&message)?
      } else {
        let reply = eyeriss.noc_mut().send((*r, *c), &message)?;
        eyeriss.noc_mut().flush()?;
        reply
      };
      Ok(match reply {
        Some(data) => format!("{} -> {}", message, data),
        None => format!("{} ok", message),
      })
    },
    Command::Stats => Ok(format_cost_report(&eyeriss.stats()?)),
    Command::Help => Ok(HELP.to_string()),
    Command::Quit => Ok(String::new()),
  }
}

/// Interactive `(eyeriss)` prompt over an accelerator
pub fn run_shell<E: Endpoint>(eyeriss: &mut Eyeriss<E>, workload: &Workload) -> Result<()> {
  let mut editor = DefaultEditor::new().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
  println!("{}", HELP);

  loop {
    match editor.readline("(eyeriss) ") {
      Ok(line) => {
        let trimmed = line.trim();
        if trimmed.is_empty() {
          continue;
        }
        let _ = editor.add_history_entry(trimmed);

        let command = match parse_command(trimmed) {
          Ok(command) => command,
          Err(msg) => {
            eprintln!("Error: {}", msg);
            continue;
          },
        };
        if command == Command::Quit {
          return Ok(());
        }
        match execute(eyeriss, workload, &command) {
          Ok(text) => println!("{}", text.trim_end()),
          Err(e) => eprintln!("Error: {}", e),
        }
      },
      // Ctrl-C / Ctrl-D: quit
      Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(()),
      Err(err) => return Err(io::Error::new(io::ErrorKind::Other, err).into()),
    }
  }
}

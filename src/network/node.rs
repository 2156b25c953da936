//! Push-model driver: one async task runs one machine against a port pair.
//!
//! This is the blocking execution discipline: the machine calls into its
//! ports from inside reads and writes, and the task suspends whenever the
//! inbound port is empty. It is built on the same
//! [`step`](crate::vm::machine::Machine::step) function as the pull-model
//! schedulers, so both disciplines stay equivalent by construction.

use tokio::task::JoinHandle;

use crate::network::port::{PortReceiver, PortSender};
use crate::vm::errors::ExecError;
use crate::vm::machine::{Machine, StepResult};

/// Drives `machine` to completion against a port pair.
///
/// Reads block until a value arrives; writes never block. Returns the
/// halted machine together with its inbound port so callers can inspect
/// final memory and drain values that arrived after the last read — in a
/// feedback ring, the terminal signal lands there.
///
/// A port torn down under a blocked read surfaces as
/// [`ExecError::Cancelled`]; any machine error ends the run.
pub async fn run(
    mut machine: Machine,
    mut input: PortReceiver,
    output: PortSender,
) -> Result<(Machine, PortReceiver), ExecError> {
    loop {
        match machine.step(None)? {
            StepResult::Continued => {}
            StepResult::Output(value) => output.send(value)?,
            StepResult::NeedsInput => {
                let value = input.recv().await?;
                machine.step(Some(value))?;
            }
            StepResult::Halted => return Ok((machine, input)),
        }
    }
}

/// Spawns [`run`] on the tokio runtime.
pub fn spawn(
    machine: Machine,
    input: PortReceiver,
    output: PortSender,
) -> JoinHandle<Result<(Machine, PortReceiver), ExecError>> {
    tokio::spawn(run(machine, input, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::port::port;
    use crate::vm::program::Program;

    #[tokio::test]
    async fn port_run_matches_buffered_run() {
        let program = Program::new(vec![
            3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8,
        ]);

        let mut buffered = Machine::new(&program);
        let expected = buffered.run_buffered(&[8]).unwrap();

        let (in_tx, in_rx) = port();
        let (out_tx, mut out_rx) = port();
        in_tx.send(8).unwrap();
        let (machine, _) = spawn(Machine::new(&program), in_rx, out_tx)
            .await
            .unwrap()
            .unwrap();

        let mut outputs = Vec::new();
        while let Some(v) = out_rx.try_recv() {
            outputs.push(v);
        }
        assert_eq!(outputs, expected);
        assert_eq!(machine.memory(), buffered.memory());
    }

    #[tokio::test]
    async fn blocked_read_waits_for_late_input() {
        let program = Program::new(vec![3, 0, 4, 0, 99]);
        let (in_tx, in_rx) = port();
        let (out_tx, mut out_rx) = port();
        let handle = spawn(Machine::new(&program), in_rx, out_tx);

        // the machine is already blocked on its read by the time this runs
        tokio::task::yield_now().await;
        in_tx.send(21).unwrap();

        handle.await.unwrap().unwrap();
        assert_eq!(out_rx.try_recv(), Some(21));
    }

    #[tokio::test]
    async fn torn_down_port_cancels_the_node() {
        let program = Program::new(vec![3, 0, 99]);
        let (in_tx, in_rx) = port();
        let (out_tx, _out_rx) = port();
        let handle = spawn(Machine::new(&program), in_rx, out_tx);

        drop(in_tx);
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
    }
}

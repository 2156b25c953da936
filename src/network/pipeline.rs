//! Pipeline / feedback-loop composition and the phase-setting search.
//!
//! `phases.len()` machines are wired in a ring: machine `k`'s outbound port
//! feeds machine `(k + 1) % n`'s inbound port, each machine is seeded with
//! its phase setting, and machine 0 additionally receives the initial
//! signal `0`. The run ends when every machine has halted; the final signal
//! is the last value delivered back to machine 0's port.
//!
//! The same wiring exists in both execution disciplines:
//! [`run_loop`] multiplexes every machine on the calling thread with a
//! deterministic round-robin scheduler (pull), and [`run_loop_tasks`] spawns
//! one task per machine over real ports (push). They produce the same value
//! for every program and phase assignment.

use std::collections::VecDeque;

use itertools::Itertools;

use crate::info;
use crate::network::errors::HarnessError;
use crate::network::node;
use crate::network::port::port;
use crate::vm::machine::{Machine, StepResult};
use crate::vm::program::Program;

/// Runs the feedback ring in the pull discipline.
///
/// The scheduler polls machines round-robin, running each until it halts or
/// blocks on an empty queue. Ordering is fully deterministic. A member
/// failure is fatal for the whole pipeline; a state where every machine is
/// blocked and none has halted reports [`HarnessError::Stalled`] instead of
/// hanging.
pub fn run_loop(program: &Program, phases: &[i64]) -> Result<i64, HarnessError> {
    if phases.is_empty() {
        return Err(HarnessError::NoSolution);
    }
    let n = phases.len();
    let mut machines: Vec<Machine> = (0..n).map(|_| Machine::new(program)).collect();
    let mut queues: Vec<VecDeque<i64>> =
        phases.iter().map(|&phase| VecDeque::from([phase])).collect();
    queues[0].push_back(0);

    let mut halted = vec![false; n];
    while halted.iter().any(|h| !h) {
        let mut progressed = false;
        for k in 0..n {
            if halted[k] {
                continue;
            }
            let fail = |source| HarnessError::NodeFailed {
                address: k as i64,
                source,
            };
            // run machine k until it suspends or halts
            loop {
                match machines[k].step(None).map_err(fail)? {
                    StepResult::Continued => progressed = true,
                    StepResult::Output(value) => {
                        queues[(k + 1) % n].push_back(value);
                        progressed = true;
                    }
                    StepResult::NeedsInput => match queues[k].pop_front() {
                        Some(value) => {
                            machines[k].step(Some(value)).map_err(fail)?;
                            progressed = true;
                        }
                        None => break,
                    },
                    StepResult::Halted => {
                        halted[k] = true;
                        break;
                    }
                }
            }
        }
        if !progressed {
            return Err(HarnessError::Stalled);
        }
    }

    queues[0].pop_back().ok_or(HarnessError::NoSolution)
}

/// Runs the feedback ring in the push discipline: one task per machine,
/// ports in between.
///
/// Unlike [`run_loop`], this discipline has no stall detection: each task
/// blocks independently on its own port, so no single vantage point can
/// observe that every machine is starved, and a ring that deadlocks on
/// input waits forever instead of reporting [`HarnessError::Stalled`].
/// Prefer [`run_loop`] for programs that are not known to terminate.
pub async fn run_loop_tasks(program: &Program, phases: &[i64]) -> Result<i64, HarnessError> {
    if phases.is_empty() {
        return Err(HarnessError::NoSolution);
    }
    let n = phases.len();
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..n).map(|_| port()).unzip();

    for (k, (&phase, sender)) in phases.iter().zip(&senders).enumerate() {
        sender.send(phase).map_err(|source| HarnessError::NodeFailed {
            address: k as i64,
            source,
        })?;
    }
    senders[0].send(0).map_err(|source| HarnessError::NodeFailed {
        address: 0,
        source,
    })?;

    // machine k reads port k and writes the ring successor's port
    let mut senders = senders;
    senders.rotate_left(1);
    let handles: Vec<_> = receivers
        .into_iter()
        .zip(senders)
        .map(|(rx, tx)| node::spawn(Machine::new(program), rx, tx))
        .collect();

    let mut loop_port = None;
    for (k, handle) in handles.into_iter().enumerate() {
        let address = k as i64;
        let (_machine, rx) = handle
            .await
            .map_err(|_| HarnessError::NodeFailed {
                address,
                source: crate::vm::errors::ExecError::Cancelled,
            })?
            .map_err(|source| HarnessError::NodeFailed { address, source })?;
        if k == 0 {
            loop_port = Some(rx);
        }
    }

    // the terminal signal is the last value delivered back to machine 0
    let mut rx = loop_port.ok_or(HarnessError::NoSolution)?;
    let mut signal = None;
    while let Some(value) = rx.try_recv() {
        signal = Some(value);
    }
    signal.ok_or(HarnessError::NoSolution)
}

/// Exhaustive search over every permutation of `phase_set`, maximizing the
/// feedback-ring signal.
///
/// An empty phase set yields [`HarnessError::NoSolution`]; a machine error
/// under any permutation aborts the whole search.
pub fn max_signal(program: &Program, phase_set: &[i64]) -> Result<i64, HarnessError> {
    let mut best: Option<i64> = None;
    for phases in phase_set.iter().copied().permutations(phase_set.len()) {
        let signal = run_loop(program, &phases)?;
        best = Some(best.map_or(signal, |b| b.max(signal)));
    }
    let best = best.ok_or(HarnessError::NoSolution)?;
    info!("best signal over {} phases: {}", phase_set.len(), best);
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    // amplifier controller samples with documented optimal signals
    const SINGLE_PASS_43210: &[i64] = &[
        3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0,
    ];
    const SINGLE_PASS_54321: &[i64] = &[
        3, 23, 3, 24, 1002, 24, 10, 24, 1002, 23, -1, 23, 101, 5, 23, 23, 1, 24, 23, 23, 4, 23,
        99, 0, 0,
    ];
    const SINGLE_PASS_65210: &[i64] = &[
        3, 31, 3, 32, 1002, 32, 10, 32, 1001, 31, -2, 31, 1007, 31, 0, 33, 1002, 33, 7, 33, 1, 33,
        31, 31, 1, 32, 31, 31, 4, 31, 99, 0, 0, 0,
    ];
    const FEEDBACK_139629729: &[i64] = &[
        3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28,
        1005, 28, 6, 99, 0, 0, 5,
    ];
    const FEEDBACK_18216: &[i64] = &[
        3, 52, 1001, 52, -5, 52, 3, 53, 1, 52, 56, 54, 1007, 54, 5, 55, 1005, 55, 26, 1001, 54,
        -5, 54, 1105, 1, 12, 1, 53, 54, 53, 1008, 54, 0, 55, 1001, 55, 1, 55, 2, 53, 55, 53, 4,
        53, 1001, 56, -1, 56, 1005, 56, 6, 99, 0, 0, 0, 0, 10,
    ];

    fn program(words: &[i64]) -> Program {
        Program::new(words.to_vec())
    }

    #[test]
    fn known_phase_assignment() {
        let signal = run_loop(&program(SINGLE_PASS_43210), &[4, 3, 2, 1, 0]).unwrap();
        assert_eq!(signal, 43210);
    }

    #[test]
    fn max_signal_single_pass_samples() {
        let phases = [0, 1, 2, 3, 4];
        assert_eq!(
            max_signal(&program(SINGLE_PASS_43210), &phases).unwrap(),
            43210
        );
        assert_eq!(
            max_signal(&program(SINGLE_PASS_54321), &phases).unwrap(),
            54321
        );
        assert_eq!(
            max_signal(&program(SINGLE_PASS_65210), &phases).unwrap(),
            65210
        );
    }

    #[test]
    fn max_signal_feedback_samples() {
        let phases = [5, 6, 7, 8, 9];
        assert_eq!(
            max_signal(&program(FEEDBACK_139629729), &phases).unwrap(),
            139629729
        );
        assert_eq!(
            max_signal(&program(FEEDBACK_18216), &phases).unwrap(),
            18216
        );
    }

    #[test]
    fn empty_phase_set_has_no_solution() {
        let err = max_signal(&program(SINGLE_PASS_43210), &[]).unwrap_err();
        assert!(matches!(err, HarnessError::NoSolution));
    }

    #[test]
    fn starved_ring_stalls_instead_of_hanging() {
        // each machine wants two values beyond its phase seed
        let err = run_loop(&program(&[3, 0, 3, 0, 3, 0, 99]), &[1]).unwrap_err();
        assert!(matches!(err, HarnessError::Stalled));
    }

    #[test]
    fn member_failure_is_fatal() {
        let err = run_loop(&program(&[77]), &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::NodeFailed { address: 0, .. }
        ));
    }

    #[tokio::test]
    async fn pull_and_push_rings_agree() {
        let program = program(FEEDBACK_139629729);
        let phases = [9, 8, 7, 6, 5];
        let pulled = run_loop(&program, &phases).unwrap();
        let pushed = run_loop_tasks(&program, &phases).await.unwrap();
        assert_eq!(pulled, pushed);
        assert_eq!(pulled, 139629729);
    }
}

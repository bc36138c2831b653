use log::warn;
use std::{
    fs::File,
    path::Path,
    process::{Child, Command, Stdio},
    thread,
    time::Duration,
};

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs external simulator processes with a bounded number in flight.
///
/// A slot is reclaimed from whichever child exits first. Exit status is
/// logged but never surfaced: a failed run leaves a short or empty output
/// file, which the summarize phase reports as missing metrics.
pub struct ProcessPool {
    max_processes: usize,
    active: Vec<(Child, String)>,
}

impl ProcessPool {
    pub fn new(max_processes: usize) -> Self {
        assert!(max_processes > 0);
        Self {
            max_processes,
            active: vec![],
        }
    }

    /// Number of tracked child processes.
    pub fn active(&self) -> usize {
        self.active.len()
    }

    /// Launch `command` with stdout redirected to `output_file`, waiting for
    /// a free slot first. If `output_file` already exists and `replace` is
    /// false the job is skipped. Returns whether a process was spawned.
    pub fn submit(
        &mut self,
        mut command: Command,
        output_file: &Path,
        replace: bool,
    ) -> anyhow::Result<bool> {
        if output_file.is_file() && !replace {
            return Ok(false);
        }

        self.admit()?;

        if let Some(dir) = output_file.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let stdout = File::create(output_file)?;
        let child = command.stdout(Stdio::from(stdout)).spawn()?;
        self.active
            .push((child, output_file.display().to_string()));
        Ok(true)
    }

    /// Block until the pool is below its ceiling.
    fn admit(&mut self) -> anyhow::Result<()> {
        while self.active.len() >= self.max_processes {
            self.reap()?;
            if self.active.len() >= self.max_processes {
                thread::sleep(REAP_POLL_INTERVAL);
            }
        }
        Ok(())
    }

    /// Remove every child that has already exited.
    fn reap(&mut self) -> anyhow::Result<()> {
        let mut i = 0;
        while i < self.active.len() {
            match self.active[i].0.try_wait()? {
                Some(status) => {
                    let (_, output_file) = self.active.remove(i);
                    if !status.success() {
                        warn!("simulator run for {} exited with {}", output_file, status);
                    }
                }
                None => i += 1,
            }
        }
        Ok(())
    }

    /// Wait for every remaining child to exit.
    pub fn drain(&mut self) -> anyhow::Result<()> {
        for (mut child, output_file) in self.active.drain(..) {
            let status = child.wait()?;
            if !status.success() {
                warn!("simulator run for {} exited with {}", output_file, status);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sleep_command(seconds: &str) -> Command {
        let mut command = Command::new("sleep");
        command.arg(seconds);
        command
    }

    #[test]
    fn existing_output_skips_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results").join("job.txt");
        std::fs::create_dir_all(output.parent().unwrap()).unwrap();
        std::fs::write(&output, b"old run").unwrap();

        let mut pool = ProcessPool::new(2);
        let spawned = pool.submit(sleep_command("0"), &output, false).unwrap();
        assert!(!spawned);
        assert_eq!(pool.active(), 0);
        // untouched
        assert_eq!(std::fs::read(&output).unwrap(), b"old run");
    }

    #[test]
    fn replace_respawns_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("job.txt");
        std::fs::write(&output, b"old run").unwrap();

        let mut pool = ProcessPool::new(2);
        let spawned = pool.submit(sleep_command("0"), &output, true).unwrap();
        assert!(spawned);
        pool.drain().unwrap();
        assert_eq!(pool.active(), 0);
        assert_eq!(std::fs::read(&output).unwrap(), b"");
    }

    #[test]
    fn submit_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results").join("10M_2B").join("job.txt");

        let mut pool = ProcessPool::new(1);
        assert!(pool.submit(sleep_command("0"), &output, false).unwrap());
        pool.drain().unwrap();
        assert!(output.is_file());
    }

    #[test]
    fn ceiling_is_never_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = ProcessPool::new(2);
        for i in 0..5 {
            let output = dir.path().join(format!("job-{}.txt", i));
            pool.submit(sleep_command("0.2"), &output, false).unwrap();
            assert!(pool.active() <= 2);
        }
        pool.drain().unwrap();
        assert_eq!(pool.active(), 0);
    }

    #[test]
    fn slot_reclaimed_from_first_finisher() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = ProcessPool::new(2);
        // oldest job outlives the younger one
        pool.submit(sleep_command("1.5"), &dir.path().join("slow.txt"), false)
            .unwrap();
        pool.submit(sleep_command("0.1"), &dir.path().join("fast.txt"), false)
            .unwrap();

        let start = Instant::now();
        pool.submit(sleep_command("0.1"), &dir.path().join("next.txt"), false)
            .unwrap();
        // admitted once the fast job exits, well before the oldest one does
        assert!(start.elapsed() < Duration::from_millis(1000));
        pool.drain().unwrap();
    }
}

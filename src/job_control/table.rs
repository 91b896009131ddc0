//! Registry of tracked jobs plus the single foreground slot.
use log::debug;

use crate::error::ShellError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JobStatus {
    Running,
    Stopped,
}

impl JobStatus {
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Running => "Running",
            JobStatus::Stopped => "Stopped",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Job {
    pub number: usize,
    /// Pid of the group leader.
    pub pid: i32,
    pub pgid: i32,
    /// Last pipeline stage; its status is the job's status.
    pub last_pid: i32,
    pub command: String,
    pub background: bool,
    pub status: JobStatus,
    /// Member processes not reaped yet.
    pub live_members: usize,
    pub signaled: bool,
}

/// Process group currently owning terminal signal delivery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Foreground {
    pub pid: i32,
    pub pgid: i32,
    pub command: String,
}

/// Description of a freshly launched process group.
#[derive(Clone, Debug)]
pub struct JobSpec {
    pub pid: i32,
    pub pgid: i32,
    pub last_pid: i32,
    pub command: String,
    pub members: usize,
}

pub struct JobTable {
    jobs: Vec<Job>,
    next_number: usize,
    capacity: usize,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Vec::new(),
            next_number: 1,
            capacity,
        }
    }

    pub fn register(
        &mut self,
        spec: JobSpec,
        background: bool,
        status: JobStatus,
    ) -> Result<&Job, ShellError> {
        if self.is_full() {
            return Err(ShellError::capacity(self.capacity));
        }
        let number = self.next_number;
        self.next_number += 1;
        debug!(
            "job event=register id={} pid={} pgid={} members={}",
            number, spec.pid, spec.pgid, spec.members
        );
        self.jobs.push(Job {
            number,
            pid: spec.pid,
            pgid: spec.pgid,
            last_pid: spec.last_pid,
            command: spec.command.trim_end_matches('&').trim().to_string(),
            background,
            status,
            live_members: spec.members,
            signaled: false,
        });
        let index = self.jobs.len() - 1;
        Ok(&self.jobs[index])
    }

    pub fn unregister(&mut self, pid: i32) -> Option<Job> {
        let index = self.jobs.iter().position(|job| job.pid == pid)?;
        debug!("job event=unregister pid={pid}");
        Some(self.jobs.remove(index))
    }

    pub fn find_by_number(&self, number: usize) -> Option<&Job> {
        self.jobs.iter().find(|job| job.number == number)
    }

    pub fn find_most_recent_background(&self) -> Option<&Job> {
        self.jobs.iter().rev().find(|job| job.background)
    }

    /// Resolve a `fg`/`bg` target: explicit number, else the latest background job.
    pub fn resolve(&self, number: Option<usize>) -> Option<&Job> {
        match number {
            Some(number) => self.find_by_number(number),
            None => self.find_most_recent_background(),
        }
    }

    pub fn get_mut(&mut self, pid: i32) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.pid == pid)
    }

    pub fn list_for_display(&self) -> Vec<&Job> {
        let mut entries: Vec<&Job> = self.jobs.iter().collect();
        entries.sort_by(|a, b| a.command.cmp(&b.command));
        entries
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub(crate) fn jobs_mut(&mut self) -> &mut Vec<Job> {
        &mut self.jobs
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

use crate::SyscallNr;

pub(crate) const NR_WRITE: u32 = 1;
pub(crate) const NR_EXECVE: u32 = 59;
pub(crate) const NR_FUTEX: u32 = 202;

// x86_64 numbering. Only the syscalls that show up in logs and profiles
// often enough to be worth naming.
const NAMES: &[(u32, &str)] = &[
    (0, "read"),
    (NR_WRITE, "write"),
    (2, "open"),
    (4, "stat"),
    (7, "poll"),
    (13, "rt_sigaction"),
    (14, "rt_sigprocmask"),
    (16, "ioctl"),
    (17, "pread64"),
    (18, "pwrite64"),
    (19, "readv"),
    (20, "writev"),
    (23, "select"),
    (42, "connect"),
    (44, "sendto"),
    (46, "sendmsg"),
    (47, "recvmsg"),
    (49, "bind"),
    (54, "setsockopt"),
    (56, "clone"),
    (NR_EXECVE, "execve"),
    (72, "fcntl"),
    (157, "prctl"),
    (165, "mount"),
    (NR_FUTEX, "futex"),
    (232, "epoll_wait"),
    (257, "openat"),
    (281, "epoll_pwait"),
    (298, "perf_event_open"),
    (317, "seccomp"),
    (321, "bpf"),
    (322, "execveat"),
    (435, "clone3"),
];

pub fn syscall_name(nr: SyscallNr) -> Option<&'static str> {
    NAMES.iter()
        .find(|(n, _)| *n == nr.0)
        .map(|(_, name)| *name)
}

pub fn syscall_by_name(name: &str) -> Option<SyscallNr> {
    NAMES.iter()
        .find(|(_, n)| *n == name)
        .map(|(nr, _)| SyscallNr(*nr))
}

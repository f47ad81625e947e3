//! MDXfind command-line construction.
use std::ffi::OsString;

use crate::hashlist::PreparedHashlist;
use crate::job::JobSpec;

/// Build the engine argument vector for `spec` using the prepared files.
///
/// Order is fixed: `-h`, `-i`/`-q`, `-f`, `-s`, `-e`, wordlist, `-w`. Optional
/// flags are left out when their value is empty or zero. Values are not
/// validated here.
pub fn build_args(spec: &JobSpec, prepared: &PreparedHashlist) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();

    if !spec.hash_type.is_empty() {
        args.push("-h".into());
        args.push(spec.hash_type.as_str().into());
    }

    if spec.iterations > 0 {
        let n = spec.iterations.to_string();
        args.push("-i".into());
        args.push(n.as_str().into());
        // -q takes the internal iteration count; the worker always mirrors -i
        args.push("-q".into());
        args.push(n.into());
    }

    args.push("-f".into());
    args.push(prepared.hash_file.clone().into_os_string());

    // MDXfind wants a salt file even when every line is blank.
    args.push("-s".into());
    args.push(prepared.salt_file.clone().into_os_string());

    // Extended search: also match truncated hashes.
    args.push("-e".into());

    if let Some(wordlist) = spec.wordlist() {
        args.push(wordlist.into());
    }

    if spec.skip > 0 {
        args.push("-w".into());
        args.push(spec.skip.to_string().into());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashlist::PreprocessStats;
    use crate::job::AttackMode;

    fn prepared() -> PreparedHashlist {
        PreparedHashlist {
            hash_file: "/jobs/7/list.txt.hashes".into(),
            salt_file: "/jobs/7/list.txt.salts".into(),
            has_salts: false,
            stats: PreprocessStats::default(),
        }
    }

    fn joined(args: &[OsString]) -> String {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn wordlist_job_with_every_option() {
        let spec = JobSpec::new(AttackMode::Wordlist, "/lists/rockyou.txt", "/jobs/7/list.txt")
            .with_skip(5000);
        insta::assert_snapshot!(
            joined(&build_args(&spec, &prepared())),
            @"-h ALL,!user,salt -i 10 -q 10 -f /jobs/7/list.txt.hashes -s /jobs/7/list.txt.salts -e /lists/rockyou.txt -w 5000"
        );
    }

    #[test]
    fn identify_job_drops_optional_flags() {
        let spec = JobSpec::new(AttackMode::Identify, "ignored", "/jobs/7/list.txt")
            .with_hash_type("")
            .with_iterations(0);
        insta::assert_snapshot!(
            joined(&build_args(&spec, &prepared())),
            @"-f /jobs/7/list.txt.hashes -s /jobs/7/list.txt.salts -e"
        );
    }

    #[test]
    fn iterations_feed_both_i_and_q() {
        let spec = JobSpec::new(AttackMode::Identify, "", "x").with_iterations(3);
        let args = build_args(&spec, &prepared());
        let i = args.iter().position(|a| a == "-i").unwrap();
        let q = args.iter().position(|a| a == "-q").unwrap();
        assert_eq!(args[i + 1], "3");
        assert_eq!(args[q + 1], "3");
        assert!(i < q);
        assert!(!args.iter().any(|a| a == "-w"));
    }
}

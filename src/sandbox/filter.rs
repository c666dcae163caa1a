//! Denylist pre-filter over raw source text.
//!
//! This is not an isolation boundary. String concatenation, reflection or any
//! API missing from the table below gets past it; real containment has to come
//! from the process layer (unprivileged user, no network, read-only mounts).

use std::sync::LazyLock;

use regex::RegexSet;

/// Result of scanning a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    Blocked(&'static str),
}

/// (reason, pattern) pairs, checked against the raw text
const RULES: &[(&str, &str)] = &[
    ("process spawning is not allowed", r"\bRuntime\s*\.\s*getRuntime\b"),
    ("process spawning is not allowed", r"\bProcessBuilder\b"),
    ("process spawning is not allowed", r"\bProcessHandle\b"),
    ("terminating the JVM is not allowed", r"\bSystem\s*\.\s*exit\s*\("),
    ("terminating the JVM is not allowed", r"\.\s*(halt|exit)\s*\(\s*-?\d*\s*\)\s*;"),
    ("threads are not allowed", r"\bThread\b"),
    ("threads are not allowed", r"\bExecutors?(Service)?\b"),
    ("threads are not allowed", r"\bjava\s*\.\s*util\s*\.\s*concurrent\b"),
    ("synchronization primitives are not allowed", r"\bsynchronized\b"),
    ("file access is not allowed", r"\bjava\s*\.\s*nio\s*\.\s*(file|channels)\b"),
    (
        "file access is not allowed",
        r"\b(File|FileInputStream|FileOutputStream|FileReader|FileWriter|RandomAccessFile|Files|Paths)\b",
    ),
    ("network access is not allowed", r"\bjava\s*\.\s*net\b"),
    (
        "network access is not allowed",
        r"\b(Socket|ServerSocket|DatagramSocket|URL|URLConnection|HttpClient)\b",
    ),
    ("dynamic class loading is not allowed", r"\bClassLoader\b"),
    ("dynamic class loading is not allowed", r"\bClass\s*\.\s*forName\b"),
    ("dynamic class loading is not allowed", r"\bSystem\s*\.\s*(load|loadLibrary)\s*\("),
    ("reflection is not allowed", r"\bjava\s*\.\s*lang\s*\.\s*(reflect|invoke)\b"),
    ("reflection is not allowed", r"\b(getDeclaredMethod|getDeclaredField|setAccessible)\b"),
    ("scripting engines are not allowed", r"\bjavax\s*\.\s*script\b"),
    ("scripting engines are not allowed", r"\bScriptEngine(Manager)?\b"),
    ("native code is not allowed", r"\bnative\b"),
    ("native code is not allowed", r"\bsun\s*\.\s*misc\b"),
    ("changing the security manager is not allowed", r"\bSecurityManager\b"),
];

static DENYLIST: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(RULES.iter().map(|(_, pattern)| *pattern)).expect("denylist patterns are valid")
});

/// Checks source text against the denylist. Pure, no side effects.
pub fn scan(source: &str) -> ScanVerdict {
    match DENYLIST.matches(source).iter().next() {
        Some(idx) => ScanVerdict::Blocked(RULES[idx].0),
        None => ScanVerdict::Clean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_programs_pass() {
        for source in [
            r#"System.out.println("hi");"#,
            "int x = 0; for (int i = 0; i < 10; i++) x += i; System.out.println(x);",
            "import java.util.*;\nList<Integer> xs = new ArrayList<>(); System.out.println(xs);",
            r#"StringBuilder sb = new StringBuilder(); sb.append("Threadless"); System.out.println(sb);"#,
        ] {
            assert_eq!(scan(source), ScanVerdict::Clean, "{source}");
        }
    }

    #[test]
    fn test_process_spawn_blocked() {
        assert_eq!(
            scan(r#"Runtime.getRuntime().exec("rm -rf /");"#),
            ScanVerdict::Blocked("process spawning is not allowed")
        );
        assert_eq!(
            scan(r#"new ProcessBuilder("ls").start();"#),
            ScanVerdict::Blocked("process spawning is not allowed")
        );
    }

    #[test]
    fn test_each_category_blocked() {
        for source in [
            "System.exit(1);",
            "System . exit (0);",
            "new Thread(() -> {}).start();",
            "synchronized (this) {}",
            r#"new FileWriter("x.txt");"#,
            r#"java.nio.file.Files.readAllLines(p);"#,
            r#"new java.net.Socket("example.com", 80);"#,
            r#"Class.forName("Evil");"#,
            "ClassLoader.getSystemClassLoader();",
            "new javax.script.ScriptEngineManager();",
            "m.setAccessible(true);",
            "private native void boom();",
        ] {
            assert!(matches!(scan(source), ScanVerdict::Blocked(_)), "{source}");
        }
    }

    #[test]
    fn test_denylist_is_textual_only() {
        // Concatenation slips past; the filter is a pre-check, not a sandbox.
        let obfuscated = r#"String n = "java.lang.Run" + "time"; System.out.println(n);"#;
        assert_eq!(scan(obfuscated), ScanVerdict::Clean);
    }
}

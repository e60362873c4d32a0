#![allow(dead_code, unused_imports)]

use std::path::{Path, PathBuf};

pub use crossrun_test_utils::builders::{ActionConfigBuilder, ConfigFileBuilder};
pub use crossrun_test_utils::{init_tracing, with_timeout, write_script};

/// Stand-in executables for a JVM run on the local target.
pub struct FakeToolchain {
    pub compiler: PathBuf,
    pub archiver: PathBuf,
    pub java: PathBuf,
}

impl FakeToolchain {
    /// - compiler: fails with a javac-style message when a source contains
    ///   `BROKEN`, otherwise writes `Main.class` into the `-d` directory
    /// - archiver: `cf <jar> -C <dir> .` writes a placeholder jar, failing
    ///   for jars of actions named `ArchiveFails`
    /// - java: exits 1 printing `boom` when an argument is `FAIL`, prints
    ///   per-test markers when an argument is `MARKERS`, exits 0 otherwise
    pub fn install(dir: &Path) -> Self {
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();

        let compiler = bin.join("fake-javac");
        write_script(
            &compiler,
            r#"out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -d) out="$2"; shift 2;;
    -classpath) shift 2;;
    *) if grep -q BROKEN "$1"; then
         echo "$1:1: error: cannot find symbol"
         echo "  symbol:   class Assert"
         exit 1
       fi
       shift;;
  esac
done
touch "$out/Main.class""#,
        );

        let archiver = bin.join("fake-jar");
        write_script(
            &archiver,
            r#"case "$2" in *ArchiveFails*) echo "cannot write $2"; exit 1;; esac
echo "jar of $4" > "$2""#,
        );

        let java = bin.join("fake-java");
        write_script(
            &java,
            r#"for arg in "$@"; do
  case "$arg" in
    FAIL) echo boom; exit 1;;
    MARKERS) echo "%%%outcome c.Multi#one SUCCESS"; echo "%%%outcome c.Multi#two SUCCESS";;
  esac
done
exit 0"#,
        );

        Self {
            compiler,
            archiver,
            java,
        }
    }

    pub fn configure(&self, builder: ConfigFileBuilder) -> ConfigFileBuilder {
        builder
            .compiler(&self.compiler)
            .archiver(&self.archiver)
            .java(&self.java)
    }
}

pub fn write_source(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join("src").join(format!("{name}.java"));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

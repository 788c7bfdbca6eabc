use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const MAIN: &str = r#"
fragment main {
    void main() { omw_FragColor = omw_Texture2D(omw_SamplerLastShader, omw_TexCoord); }
}
technique { passes = main; }
"#;

const BLOOM: &str = r#"
uniform_float threshold { default = 0.8; min = 0.0; max = 1.0; }

render_target RT_Bright {
    width_ratio = 0.5;
    height_ratio = 0.5;
    mipmaps = true;
}

fragment bright(target = RT_Bright) {
    void main() { omw_FragColor = max(omw_Texture2D(omw_SamplerLastShader, omw_TexCoord) - threshold, 0.0); }
}

fragment combine {
    void main() { omw_FragColor = omw_Texture2D(omw_SamplerLastShader, omw_TexCoord) + omw_Texture2D(RT_Bright, omw_TexCoord); }
}

technique {
    passes = bright, combine;
    description = "cheap bloom";
}
"#;

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        let workspace = Self { root };
        workspace.write_technique("main", MAIN);
        workspace.write_technique("bloom", BLOOM);
        workspace
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn write_technique(&self, name: &str, contents: &str) {
        let dir = self.path().join("data").join("shaders");
        fs::create_dir_all(&dir).expect("create shader dir");
        fs::write(dir.join(format!("{name}.omwfx")), contents).expect("write technique");
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_fxtool"))
            .args(args)
            .env("FXTOOL_CONFIG_DIR", self.path().join("config"))
            .env("FXTOOL_DATA_DIR", self.path().join("data"))
            .env_remove("FXTOOL_SHADER_DIR")
            .env("RUST_LOG", "warn")
            .output()
            .expect("run fxtool")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn check_passes_for_valid_techniques() {
    let workspace = Workspace::new();
    let output = workspace.run(&["check"]);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("ok      bloom"), "{text}");
    assert!(text.contains("ok      main"), "{text}");
}

#[test]
fn check_fails_on_broken_technique() {
    let workspace = Workspace::new();
    workspace.write_technique("broken", "technique { passes = missing; }");
    let output = workspace.run(&["check", "--json"]);
    assert!(!output.status.success());

    let reports: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("check --json output");
    let broken = reports
        .as_array()
        .and_then(|list| list.iter().find(|r| r["name"] == "broken"))
        .expect("broken report");
    assert_eq!(broken["valid"], false);
    assert_eq!(broken["status"], "ParseError");
}

#[test]
fn glsl_prints_generated_fragment() {
    let workspace = Workspace::new();
    let output = workspace.run(&["glsl", "bloom", "--pass", "bright", "--stage", "fragment"]);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.starts_with("// bloom :: bright (fragment)"), "{text}");
    assert!(text.contains("#version 330"), "{text}");
    assert!(text.contains("uniform float threshold;"), "{text}");
}

#[test]
fn layout_reports_block_size() {
    let workspace = Workspace::new();
    let output = workspace.run(&["layout"]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("size: 464 bytes"));
}

#[test]
fn plan_json_lists_dispatch_and_targets() {
    let workspace = Workspace::new();
    let output = workspace.run(&["plan", "--chain", "bloom", "--size", "800x600", "--json"]);
    assert!(output.status.success(), "{output:?}");

    let plan: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("plan --json");
    assert_eq!(plan["outcome"]["outcome"], "rendered");
    assert_eq!(plan["outcome"]["passes"], 3);

    let dispatch = plan["dispatch"].as_array().expect("dispatch array");
    assert_eq!(dispatch.len(), 2);
    assert_eq!(dispatch[1]["technique"], "bloom");
    let bright = &dispatch[1]["passes"][0];
    assert_eq!(bright["target"], "RT_Bright");
    assert_eq!(bright["size"], serde_json::json!([400, 300]));
}

#[test]
fn plan_uses_chain_from_config_file() {
    let workspace = Workspace::new();
    let config_dir = workspace.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("postprocess.toml"), "chain = \"bloom\"\n").unwrap();

    let output = workspace.run(&["plan"]);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("rendered 3 pass(es) at 1920x1080"), "{text}");
    assert!(text.contains("RT_Bright 960x540"), "{text}");
}

#[test]
fn where_reports_overridden_directories() {
    let workspace = Workspace::new();
    let output = workspace.run(&["where"]);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    let config = workspace.path().join("config");
    let shaders = workspace.path().join("data").join("shaders");
    assert!(text.contains(&format!("config:   {}", config.display())), "{text}");
    assert!(
        text.contains(&format!("settings: {}", config.join("shader_settings.toml").display())),
        "{text}"
    );
    assert!(text.contains(&format!("shaders:  {}", shaders.display())), "{text}");
}

#[test]
fn invalid_config_is_reported() {
    let workspace = Workspace::new();
    let config_dir = workspace.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("postprocess.toml"), "antialiasing = 3\n").unwrap();

    let output = workspace.run(&["plan"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load config"));
}

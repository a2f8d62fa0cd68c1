use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_scene() -> NamedTempFile {
    let scene = r#"<scene>
  <settings>
    <tick_rate>50</tick_rate>
  </settings>
  <catalog>
    <item><id>TestItem-Cube</id></item>
    <item>
      <id>M9</id>
      <kind>firearm</kind>
      <ammo_type>Pistol</ammo_type>
      <clip_size>12</clip_size>
      <fresh_ammo>36</fresh_ammo>
      <holding_ammo>24</holding_ammo>
      <attack_rate>0.25</attack_rate>
      <damage>25</damage>
    </item>
  </catalog>
  <object>
    <name>P1</name>
    <type>actor</type>
    <health>100</health>
    <listener match="tag" value="Item">look_at_item</listener>
  </object>
  <object>
    <name>Cube</name>
    <type>item</type>
    <tag>Item</tag>
    <item>TestItem-Cube</item>
    <position>0 0 -3</position>
  </object>
  <object>
    <name>M9</name>
    <type>item</type>
    <tag>Item</tag>
    <item>M9</item>
    <position>-3 0 0</position>
  </object>
  <object>
    <name>Dummy</name>
    <tag>Enemy</tag>
    <entity>D1</entity>
    <health>30</health>
    <position>0 0 3</position>
  </object>
  <input tick="1" actor="P1" tap="Interact"/>
  <input tick="3" actor="P1" look="0 90 0"/>
  <input tick="4" actor="P1" tap="Interact"/>
  <input tick="6" actor="P1" look="0 180 0"/>
  <input tick="7" actor="P1" tap="Fire"/>
  <input tick="30" actor="P1" tap="Fire"/>
</scene>
"#;

    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(scene.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn cli_runs_scripted_scene_and_prints_events() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("sightline-runtime").expect("binary exists");
    cmd.arg(scene.path());
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 4 objects (1 actors)"))
        .stdout(contains(" - Cube (item)"))
        .stdout(contains("[tick 1] P1 gaze enter Cube"))
        .stdout(contains("[tick 2] P1 gaze exit Cube"))
        .stdout(contains("[tick 3] P1 gaze enter M9"))
        .stdout(contains("[tick 4] P1 equipped M9"))
        .stdout(contains("[tick 6] P1 gaze enter Dummy"))
        .stdout(contains("[tick 7] P1 attacks with M9 for 25.00"))
        .stdout(contains("[tick 30] D1 died"));
}

#[test]
fn cli_summary_reports_final_ledgers() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("sightline-runtime").expect("binary exists");
    cmd.arg(scene.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Final health:"))
        .stdout(contains(" - P1 health=100.00"))
        .stdout(contains(" - P1 M9 x1"))
        .stdout(contains(" - P1 M9_Chambered x10"))
        .stdout(contains(" - P1 Pistol_Reserves x24"))
        .stdout(contains(" - P1 TestItem-Cube x1"))
        .stdout(contains("[tick").not());
}

#[test]
fn cli_rejects_unknown_arguments() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("sightline-runtime").expect("binary exists");
    cmd.arg(scene.path()).arg("--render");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --render"));
}

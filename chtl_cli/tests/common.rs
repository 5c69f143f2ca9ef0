use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn chtl_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("chtl"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("CHTL_LOG");
	cmd
}

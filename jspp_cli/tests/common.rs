use assert_cmd::Command;

pub fn jspp_cmd() -> Command {
	let mut cmd = Command::new(env!("CARGO_BIN_EXE_jspp"));
	cmd.env("NO_COLOR", "1").env_remove("JSPP_LOG");
	cmd
}

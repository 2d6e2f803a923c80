fn main() -> anyhow::Result<()> {
    routerchat_lib::run()
}

fn main() -> anyhow::Result<()> {
    redlight_lib::run()
}

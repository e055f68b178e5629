fn main() -> anyhow::Result<()> {
    sph2d::run()
}

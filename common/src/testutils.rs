#[cfg(test)]
pub async fn create_temp_dir() -> anyhow::Result<std::path::PathBuf> {
    let mut idx = 0;
    loop {
        let tmp_dir = std::env::temp_dir().join(format!("archive_upload_test{}", &idx));
        if let Err(error) = tokio::fs::create_dir(&tmp_dir).await {
            match error.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    idx += 1;
                }
                _ => return Err(error.into()),
            }
        } else {
            return Ok(tmp_dir);
        }
    }
}

#[cfg(test)]
pub async fn setup_test_dir() -> anyhow::Result<std::path::PathBuf> {
    // create a temporary directory
    let tmp_dir = create_temp_dir().await?;
    // foo
    // |- 0.txt
    // |- bar
    //    |- 1.txt
    //    |- 2.txt
    //    |- 3.txt
    // |- baz
    //    |- 4.txt
    //    |- 5.txt -> ../bar/2.txt
    //    |- 6.txt -> (absolute path) .../foo/bar/3.txt
    let foo_path = tmp_dir.join("foo");
    tokio::fs::create_dir(&foo_path).await.unwrap();
    tokio::fs::write(foo_path.join("0.txt"), "0").await.unwrap();
    let bar_path = foo_path.join("bar");
    tokio::fs::create_dir(&bar_path).await.unwrap();
    tokio::fs::write(bar_path.join("1.txt"), "1").await.unwrap();
    tokio::fs::write(bar_path.join("2.txt"), "2").await.unwrap();
    tokio::fs::write(bar_path.join("3.txt"), "3").await.unwrap();
    let baz_path = foo_path.join("baz");
    tokio::fs::create_dir(&baz_path).await.unwrap();
    tokio::fs::write(baz_path.join("4.txt"), "4").await.unwrap();
    tokio::fs::symlink("../bar/2.txt", baz_path.join("5.txt"))
        .await
        .unwrap();
    tokio::fs::symlink(bar_path.join("3.txt"), baz_path.join("6.txt"))
        .await
        .unwrap();
    Ok(tmp_dir)
}

/// A small runfolder as produced by a sequencer
///
/// runfolder
/// |- RunInfo.xml
/// |- SampleSheet.csv
/// |- Config
///    |- Effective.cfg
/// |- Data
///    |- Intensities
///       |- s_1.bcl
///       |- s_1.cif
///    |- Thumbnail_Images
///       |- a.jpg
/// |- Logs
///    |- run.log
#[cfg(test)]
pub async fn setup_runfolder(parent: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    let runfolder = parent.join("runfolder");
    let intensities = runfolder.join("Data").join("Intensities");
    let thumbnails = runfolder.join("Data").join("Thumbnail_Images");
    tokio::fs::create_dir_all(&intensities).await?;
    tokio::fs::create_dir_all(&thumbnails).await?;
    tokio::fs::create_dir_all(runfolder.join("Config")).await?;
    tokio::fs::create_dir_all(runfolder.join("Logs")).await?;
    tokio::fs::write(runfolder.join("RunInfo.xml"), "<RunInfo/>").await?;
    tokio::fs::write(runfolder.join("SampleSheet.csv"), "Lane,Sample\n1,a\n").await?;
    tokio::fs::write(runfolder.join("Config").join("Effective.cfg"), "cfg").await?;
    tokio::fs::write(intensities.join("s_1.bcl"), vec![7u8; 2048]).await?;
    tokio::fs::write(intensities.join("s_1.cif"), vec![9u8; 512]).await?;
    tokio::fs::write(thumbnails.join("a.jpg"), "jpg").await?;
    tokio::fs::write(runfolder.join("Logs").join("run.log"), "log").await?;
    Ok(runfolder)
}

/// Every path below `root` with its size (0 for directories), for comparing tree shapes
#[cfg(test)]
pub fn tree_listing(root: &std::path::Path) -> Vec<(std::path::PathBuf, u64)> {
    let mut listing = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let metadata = std::fs::symlink_metadata(&path).unwrap();
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            if metadata.is_dir() {
                pending.push(path);
                listing.push((relative, 0));
            } else {
                let size = std::fs::metadata(&path).map(|md| md.len()).unwrap_or(0);
                listing.push((relative, size));
            }
        }
    }
    listing.sort();
    listing
}

/// Writes a script standing in for dsmc and returns the program line running it
#[cfg(test)]
pub async fn fake_dsmc(dir: &std::path::Path, body: &str) -> anyhow::Result<String> {
    let script = dir.join("fake_dsmc");
    tokio::fs::write(&script, format!("{}\n", body)).await?;
    Ok(format!("sh {}", script.display()))
}

/// Dispatcher that records requests instead of running them
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    pub requests: std::sync::Mutex<Vec<crate::dispatch::JobRequest>>,
}

#[cfg(test)]
impl RecordingDispatcher {
    pub fn requests(&self) -> Vec<crate::dispatch::JobRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl crate::dispatch::CommandDispatcher for RecordingDispatcher {
    fn start(
        &self,
        request: crate::dispatch::JobRequest,
    ) -> crate::error::Result<crate::dispatch::JobId> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        Ok(crate::dispatch::JobId(requests.len() as u64))
    }

    fn status(
        &self,
        id: crate::dispatch::JobId,
    ) -> crate::error::Result<crate::dispatch::JobState> {
        if id.0 == 0 || id.0 as usize > self.requests.lock().unwrap().len() {
            return Err(crate::error::Error::UnknownJob(id.to_string()));
        }
        Ok(crate::dispatch::JobState::Queued)
    }
}

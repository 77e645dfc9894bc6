use crate::asset::source::PhotoAssetImageSource;
use crate::local::source::LocalImageSource;
use crate::remote::source::RemoteImageSource;
use crate::request::id::ImageRequestId;
use crate::request::image::{FromDecodedImage, Size};
use crate::request::options::ImageRequestOptions;
use crate::request::result::ImageRequestResult;
use crate::request::source::ImageSource;

/// Any of the supported image origins, for storing sources side by side.
#[derive(Debug, Clone)]
pub enum AnyImageSource {
    Local(LocalImageSource),
    Asset(PhotoAssetImageSource),
    Remote(RemoteImageSource),
}

impl ImageSource for AnyImageSource {
    fn request_image<T, F>(&self, options: ImageRequestOptions, result_handler: F) -> ImageRequestId
    where
        T: FromDecodedImage,
        F: FnMut(ImageRequestResult<T>) + Send + 'static,
    {
        match self {
            AnyImageSource::Local(source) => source.request_image(options, result_handler),
            AnyImageSource::Asset(source) => source.request_image(options, result_handler),
            AnyImageSource::Remote(source) => source.request_image(options, result_handler),
        }
    }

    fn cancel_request(&self, id: ImageRequestId) {
        match self {
            AnyImageSource::Local(source) => source.cancel_request(id),
            AnyImageSource::Asset(source) => source.cancel_request(id),
            AnyImageSource::Remote(source) => source.cancel_request(id),
        }
    }

    fn image_size<F>(&self, completion: F)
    where
        F: FnOnce(Option<Size>) + Send + 'static,
    {
        match self {
            AnyImageSource::Local(source) => source.image_size(completion),
            AnyImageSource::Asset(source) => source.image_size(completion),
            AnyImageSource::Remote(source) => source.image_size(completion),
        }
    }

    fn full_resolution_image_data<F>(&self, completion: F)
    where
        F: FnOnce(Option<Vec<u8>>) + Send + 'static,
    {
        match self {
            AnyImageSource::Local(source) => source.full_resolution_image_data(completion),
            AnyImageSource::Asset(source) => source.full_resolution_image_data(completion),
            AnyImageSource::Remote(source) => source.full_resolution_image_data(completion),
        }
    }

    fn is_equal_to(&self, other: &AnyImageSource) -> bool {
        match self {
            AnyImageSource::Local(source) => source.is_equal_to(other),
            AnyImageSource::Asset(source) => source.is_equal_to(other),
            AnyImageSource::Remote(source) => source.is_equal_to(other),
        }
    }
}

impl PartialEq for AnyImageSource {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal_to(other)
    }
}

impl From<LocalImageSource> for AnyImageSource {
    fn from(source: LocalImageSource) -> Self {
        AnyImageSource::Local(source)
    }
}

impl From<PhotoAssetImageSource> for AnyImageSource {
    fn from(source: PhotoAssetImageSource) -> Self {
        AnyImageSource::Asset(source)
    }
}

impl From<RemoteImageSource> for AnyImageSource {
    fn from(source: RemoteImageSource) -> Self {
        AnyImageSource::Remote(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::backend::Asset;
    use crate::test_support::{test_context, FakeDownloader, FakePhotoLibrary};
    use reqwest::Url;
    use std::sync::Arc;

    #[test]
    fn test_sources_of_different_kinds_differ() {
        let context = test_context();
        let local = AnyImageSource::from(LocalImageSource::new(context.clone(), "/photos/a.jpg"));
        let asset = AnyImageSource::from(PhotoAssetImageSource::new(
            context.clone(),
            Asset::new("/photos/a.jpg", 1, 1),
            Arc::new(FakePhotoLibrary::default()),
        ));
        let url = Url::parse("file:///photos/a.jpg").unwrap();
        let remote = AnyImageSource::from(RemoteImageSource::new(context, url, Arc::new(FakeDownloader::default())));

        assert_ne!(local, asset);
        assert_ne!(local, remote);
        assert_ne!(asset, remote);
        assert_eq!(local, local.clone());
        assert_eq!(remote, remote.clone());
    }
}
